//! Error types for media staging.

use thiserror::Error;

/// Errors that can occur while staging or loading media.
#[derive(Debug, Error)]
pub enum MediaError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
