//! LinkedIn publish gateway.
//!
//! Thin client over the platform's Posts, UGC, asset-upload, share
//! deletion, and OAuth token endpoints. Every call is a single attempt
//! with a client-wide timeout; retry and fallback policy live in the
//! orchestrator, not here.

mod client;
mod error;
mod types;

pub use client::{LinkedInClient, normalize_post_id};
pub use error::LinkedInError;
pub use types::{
    AuthContext, DeleteOutcome, DraftPost, Gateway, ImageUpload, PublishTarget, TokenGrant,
};
