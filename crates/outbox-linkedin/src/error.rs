//! Error types for the LinkedIn gateway.

use thiserror::Error;

/// Errors that can occur when calling the platform.
#[derive(Debug, Error)]
pub enum LinkedInError {
    /// Access token is invalid or expired (HTTP 401).
    #[error("access token invalid or expired")]
    AuthExpired,

    /// The token lacks permission for this operation (HTTP 403).
    #[error("insufficient permissions: {0}")]
    PermissionDenied(String),

    /// Rate limited by the platform (HTTP 429).
    #[error("rate limited by platform")]
    RateLimited,

    /// The referenced post does not exist (HTTP 404).
    #[error("post not found: {0}")]
    PostNotFound(String),

    /// The caller asked for an identity the credentials don't carry.
    #[error("misconfigured publish identity: {0}")]
    Misconfigured(String),

    /// OAuth code exchange failed.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// Any other platform response, including timeouts.
    #[error("platform error: {0}")]
    Platform(String),

    /// HTTP transport failure (includes request timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform returned a body we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
