//! Error types for the HTTP API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use outbox_linkedin::LinkedInError;
use outbox_publisher::PublishError;
use outbox_store::StoreError;

/// Errors that can occur while serving the API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request input.
    #[error("{0}")]
    BadRequest(String),

    /// Orchestrator error.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Gateway error from a direct platform call (OAuth flow).
    #[error(transparent)]
    Gateway(#[from] LinkedInError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Publish(err) => publish_status(err),
            ApiError::Gateway(err) => gateway_status(err),
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn publish_status(err: &PublishError) -> StatusCode {
    match err {
        PublishError::Validation(_) | PublishError::NotConnected(_) => StatusCode::BAD_REQUEST,
        PublishError::OrgNotFound(_) | PublishError::JobNotFound(_) => StatusCode::NOT_FOUND,
        PublishError::InvalidState { .. } => StatusCode::CONFLICT,
        PublishError::Gateway(err) => gateway_status(err),
        PublishError::MediaUnavailable
        | PublishError::Store(_)
        | PublishError::Media(_)
        | PublishError::Scheduler(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn gateway_status(err: &LinkedInError) -> StatusCode {
    match err {
        LinkedInError::AuthExpired => StatusCode::UNAUTHORIZED,
        LinkedInError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        LinkedInError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        LinkedInError::PostNotFound(_) => StatusCode::NOT_FOUND,
        LinkedInError::Misconfigured(_) => StatusCode::BAD_REQUEST,
        LinkedInError::TokenExchange(_)
        | LinkedInError::Platform(_)
        | LinkedInError::Http(_)
        | LinkedInError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = json!({
            "code": status.as_u16(),
            "data": serde_json::Value::Null,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_errors_map_to_statuses() {
        let cases = [
            (
                ApiError::Publish(PublishError::Validation("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Publish(PublishError::OrgNotFound("o".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Publish(PublishError::InvalidState {
                    id: "p".into(),
                    status: "posted".into(),
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Publish(PublishError::Gateway(LinkedInError::AuthExpired)),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Gateway(LinkedInError::RateLimited),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ApiError::Gateway(LinkedInError::Platform("500".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected);
        }
    }

    #[test]
    fn error_responses_carry_the_status() {
        let response =
            ApiError::Publish(PublishError::JobNotFound("missing".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
