//! HTTP API for the publishing service.
//!
//! Every endpoint answers with the same JSON envelope:
//! `{ "code": <http status>, "data": <payload or null>, "message": <text> }`.

mod error;
mod routes;

pub use error::ApiError;
pub use routes::{AppState, create_router};
