//! Error types for the orchestrator.

use thiserror::Error;

/// Errors that can occur while orchestrating a publication.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Bad or missing input. Always raised before any side effect.
    #[error("{0}")]
    Validation(String),

    /// Unknown organization.
    #[error("organization not found: {0}")]
    OrgNotFound(String),

    /// The organization has not completed the platform connect flow.
    #[error("platform not connected for organization {0}")]
    NotConnected(String),

    /// Unknown scheduled post.
    #[error("scheduled post not found: {0}")]
    JobNotFound(String),

    /// The operation is not allowed from the job's current status.
    #[error("cannot modify post {id} with status: {status}")]
    InvalidState { id: String, status: String },

    /// Mandatory media could not be loaded for a deferred publish.
    #[error("no staged media could be loaded")]
    MediaUnavailable,

    /// Gateway failure, surfaced with its specific kind.
    #[error(transparent)]
    Gateway(#[from] outbox_linkedin::LinkedInError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] outbox_store::StoreError),

    /// Media staging failure.
    #[error(transparent)]
    Media(#[from] outbox_media::MediaError),

    /// Scheduler failure.
    #[error(transparent)]
    Scheduler(#[from] outbox_scheduler::SchedulerError),
}
