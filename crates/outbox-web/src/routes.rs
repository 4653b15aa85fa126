//! API routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use outbox_linkedin::LinkedInClient;
use outbox_media::UploadedFile;
use outbox_publisher::{PublishRequest, Publisher};
use outbox_store::{NewOrganization, PostStatus, PostStore};

use crate::error::ApiError;

/// Most images the platform accepts per post.
const MAX_UPLOAD_FILES: usize = 10;

/// Shared state for the API server.
pub struct AppState {
    pub publisher: Arc<Publisher>,
    pub store: Arc<PostStore>,
    /// Concrete client for the OAuth flow; publishing goes through the
    /// publisher's gateway.
    pub linkedin: Arc<LinkedInClient>,
    /// Where the browser lands after the OAuth callback completes.
    pub post_auth_redirect: String,
}

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Organizations
        .route("/api/organizations", get(list_orgs).post(create_org))
        .route("/api/organizations/{id}", get(get_org).delete(delete_org))
        // OAuth connect flow
        .route("/api/linkedin/auth", get(auth_start))
        .route("/api/linkedin/auth/callback", get(auth_callback))
        // Publishing
        .route("/api/linkedin/post", post(create_post))
        .route("/api/linkedin/post-with-files", post(create_post_with_files))
        .route("/api/linkedin/scheduled-posts", get(list_scheduled))
        .route("/api/linkedin/scheduled-posts/{id}", delete(cancel_scheduled))
        .route(
            "/api/linkedin/scheduled-posts/{id}/reschedule",
            put(reschedule),
        )
        .route("/api/linkedin/posts", get(list_posted))
        .route("/api/linkedin/posts/{post_id}", delete(delete_post))
        .route("/api/linkedin/analytics/{org_id}", get(analytics))
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Standard response envelope.
fn envelope(status: StatusCode, data: Option<Value>, message: &str) -> Response {
    let body = json!({
        "code": status.as_u16(),
        "data": data,
        "message": message,
    });
    (status, Json(body)).into_response()
}

fn ok<T: Serialize>(data: T) -> Response {
    envelope(StatusCode::OK, Some(json!(data)), "success")
}

fn created<T: Serialize>(data: T) -> Response {
    envelope(StatusCode::CREATED, Some(json!(data)), "created")
}

async fn health() -> Response {
    ok(json!({ "status": "ok" }))
}

// ============================================================================
// Organizations
// ============================================================================

async fn list_orgs(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    Ok(ok(state.store.list_orgs()?))
}

async fn create_org(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewOrganization>,
) -> Result<Response, ApiError> {
    if new.name.trim().is_empty() || new.client_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and client_id are required".to_string(),
        ));
    }
    Ok(created(state.store.create_org(new)?))
}

async fn get_org(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let org = state
        .store
        .get_org(&id)?
        .ok_or(outbox_publisher::PublishError::OrgNotFound(id))?;
    Ok(ok(org))
}

async fn delete_org(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    if !state.store.delete_org(&id)? {
        return Err(outbox_publisher::PublishError::OrgNotFound(id).into());
    }
    Ok(ok(json!({ "deleted": true })))
}

// ============================================================================
// OAuth connect flow
// ============================================================================

#[derive(Deserialize)]
struct AuthStartQuery {
    org_id: String,
}

/// Hand the browser the platform authorization URL. The org id rides in
/// the `state` parameter and comes back on the callback.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthStartQuery>,
) -> Result<Response, ApiError> {
    let org = state
        .store
        .get_org(&query.org_id)?
        .ok_or(outbox_publisher::PublishError::OrgNotFound(query.org_id))?;
    let url = state
        .linkedin
        .authorization_url(&org.client_id, &org.redirect_uri, &org.id);
    Ok(ok(json!({ "auth_url": url })))
}

#[derive(Deserialize)]
struct AuthCallbackQuery {
    code: String,
    state: String,
}

async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthCallbackQuery>,
) -> Result<Response, ApiError> {
    let org = state
        .store
        .get_org(&query.state)?
        .ok_or(outbox_publisher::PublishError::OrgNotFound(query.state))?;

    let grant = state
        .linkedin
        .exchange_code(
            &org.client_id,
            &org.client_secret,
            &org.redirect_uri,
            &query.code,
        )
        .await?;
    state
        .store
        .set_org_connection(&org.id, &grant.access_token, &grant.member_id)?;

    info!(org_id = %org.id, "platform connected");
    Ok(Redirect::to(&state.post_auth_redirect).into_response())
}

// ============================================================================
// Publishing
// ============================================================================

#[derive(Deserialize)]
struct PostBody {
    org_id: String,
    message: String,
    #[serde(default)]
    image_urls: Vec<String>,
    #[serde(default)]
    post_as_organization: bool,
    /// When present, defer the publish to this time instead of posting
    /// immediately.
    #[serde(default)]
    scheduled_time: Option<DateTime<Utc>>,
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PostBody>,
) -> Result<Response, ApiError> {
    let request = PublishRequest {
        org_id: body.org_id,
        message: body.message,
        image_urls: body.image_urls,
        post_as_organization: body.post_as_organization,
        files: Vec::new(),
    };
    dispatch(&state.publisher, request, body.scheduled_time).await
}

async fn create_post_with_files(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (request, scheduled_time) = parse_upload_form(multipart).await?;
    dispatch(&state.publisher, request, scheduled_time).await
}

/// Route a request to the immediate or deferred path.
async fn dispatch(
    publisher: &Arc<Publisher>,
    request: PublishRequest,
    scheduled_time: Option<DateTime<Utc>>,
) -> Result<Response, ApiError> {
    match scheduled_time {
        Some(due_at) => Ok(created(publisher.schedule(request, due_at).await?)),
        None => Ok(ok(publisher.publish_now(request).await?)),
    }
}

/// Pull the publish fields and file parts out of a multipart form.
async fn parse_upload_form(
    mut multipart: Multipart,
) -> Result<(PublishRequest, Option<DateTime<Utc>>), ApiError> {
    let mut request = PublishRequest::default();
    let mut scheduled_time = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "org_id" => request.org_id = read_text(field, &name).await?,
            "message" => request.message = read_text(field, &name).await?,
            "image_urls" => request.image_urls.push(read_text(field, &name).await?),
            "post_as_organization" => {
                request.post_as_organization = read_text(field, &name).await? == "true";
            }
            "scheduled_time" => {
                let raw = read_text(field, &name).await?;
                let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|_| {
                    ApiError::BadRequest(format!("invalid scheduled_time: {raw}"))
                })?;
                scheduled_time = Some(parsed.with_timezone(&Utc));
            }
            "files" => {
                if request.files.len() >= MAX_UPLOAD_FILES {
                    return Err(ApiError::BadRequest(format!(
                        "at most {MAX_UPLOAD_FILES} files per post"
                    )));
                }
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable file part: {e}")))?;
                request.files.push(UploadedFile {
                    bytes: bytes.to_vec(),
                    mime,
                    original_name,
                });
            }
            _ => {}
        }
    }

    Ok((request, scheduled_time))
}

async fn read_text(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("unreadable field {name}: {e}")))
}

#[derive(Deserialize)]
struct ScheduledQuery {
    org_id: Option<String>,
    status: Option<String>,
}

async fn list_scheduled(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScheduledQuery>,
) -> Result<Response, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(
            PostStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status: {raw}")))?,
        ),
    };
    let posts = state
        .store
        .list_scheduled(query.org_id.as_deref(), status)?;
    Ok(ok(posts))
}

async fn cancel_scheduled(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(ok(state.publisher.cancel(&id).await?))
}

#[derive(Deserialize)]
struct RescheduleBody {
    scheduled_time: DateTime<Utc>,
}

async fn reschedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RescheduleBody>,
) -> Result<Response, ApiError> {
    Ok(ok(state
        .publisher
        .reschedule(&id, body.scheduled_time)
        .await?))
}

#[derive(Deserialize)]
struct PostedQuery {
    org_id: Option<String>,
}

async fn list_posted(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostedQuery>,
) -> Result<Response, ApiError> {
    Ok(ok(state.store.list_posted(query.org_id.as_deref())?))
}

#[derive(Deserialize)]
struct DeletePostQuery {
    org_id: String,
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    Query(query): Query<DeletePostQuery>,
) -> Result<Response, ApiError> {
    Ok(ok(state
        .publisher
        .delete_remote(&query.org_id, &post_id)
        .await?))
}

async fn analytics(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(ok(state.publisher.analytics(&org_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_and_created_use_their_statuses() {
        assert_eq!(ok(json!({})).status(), StatusCode::OK);
        assert_eq!(created(json!({})).status(), StatusCode::CREATED);
    }

    #[test]
    fn post_body_defaults_optional_fields() {
        let body: PostBody = serde_json::from_str(
            r#"{"org_id":"o1","message":"hi"}"#,
        )
        .unwrap();
        assert!(body.image_urls.is_empty());
        assert!(!body.post_as_organization);
        assert!(body.scheduled_time.is_none());
    }
}
