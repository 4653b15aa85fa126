//! SQLite-backed records for the publishing service.
//!
//! Three tables: organizations (platform credentials and connection
//! state), scheduled posts (the deferred-publish audit trail; rows are
//! never deleted, only status transitions), and posted content (an
//! append-only log of successful publications).

mod db;
mod error;
mod types;

pub use db::PostStore;
pub use error::StoreError;
pub use types::{
    Analytics, MediaSummary, NewOrganization, NewScheduledPost, Organization, PostStatus,
    PostedRecord, ScheduledPost,
};
