//! Error types for the scheduler.

use thiserror::Error;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A timer is already armed under this job name.
    #[error("job name already armed: {0}")]
    DuplicateJobName(String),
}
