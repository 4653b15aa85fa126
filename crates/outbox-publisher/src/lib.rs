//! Publish orchestrator.
//!
//! The state machine behind every publication: immediate publishes with
//! strategy fallback, deferred publishes armed in the timer registry,
//! cancel/reschedule of pending jobs, remote-deletion reconciliation,
//! and the startup pass that re-arms persisted jobs after a restart.

mod error;
mod publisher;
mod strategy;

pub use error::PublishError;
pub use publisher::{
    DeleteReceipt, PublishReceipt, PublishRequest, Publisher, RecoveryReport,
};
pub use strategy::{StrategyOutcome, strategy_chain};
