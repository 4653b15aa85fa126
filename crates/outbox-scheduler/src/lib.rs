//! In-process timer registry for deferred publish jobs.
//!
//! This crate provides the single authoritative answer to "is this job
//! still pending": a job name maps to at most one live, cancellable
//! timer, and registry membership exactly mirrors "armed and not yet
//! fired". Firing and cancellation race through the registry lock, so
//! at most one of them ever proceeds for a given name.

mod error;
mod scheduler;

pub use error::SchedulerError;
pub use scheduler::{Scheduler, TimerTask};
