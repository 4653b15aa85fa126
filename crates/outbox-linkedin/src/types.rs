//! Gateway types and the publish trait.

use async_trait::async_trait;

use crate::LinkedInError;

/// Credentials and identities for one organization's platform account.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub access_token: String,
    /// Person identity from the OAuth userinfo response.
    pub member_id: Option<String>,
    /// Company page id, present only when configured.
    pub organization_id: Option<String>,
}

/// Which identity and API a publish attempt goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishTarget {
    /// Posts API, acting as the member.
    MemberPosts,
    /// UGC API, acting as the member. The fallback path, and the only
    /// path that carries uploaded image buffers.
    MemberUgc,
    /// Posts API, acting as the company page.
    OrganizationPosts,
}

/// An image buffer ready to upload alongside a post.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: String,
}

/// The content of one publish attempt.
#[derive(Debug, Clone, Default)]
pub struct DraftPost {
    pub message: String,
    /// Remote images, downloaded and re-uploaded to the platform.
    pub image_urls: Vec<String>,
    /// Locally held image buffers.
    pub images: Vec<ImageUpload>,
}

/// Result of a delete call.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    /// Which API performed the delete.
    pub method: &'static str,
    /// True when the platform reported the post already gone; treated
    /// as success by callers.
    pub already_deleted: bool,
}

/// Result of the OAuth authorization-code exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub member_id: String,
}

/// One publish attempt against the platform. No internal retry; the
/// orchestrator owns strategy order and fallback.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Publish `draft` under `target`, returning the platform post id.
    async fn publish(
        &self,
        auth: &AuthContext,
        target: PublishTarget,
        draft: &DraftPost,
    ) -> Result<String, LinkedInError>;

    /// Delete a post. Not-found is normalized into
    /// `already_deleted = true`, not an error.
    async fn delete_post(
        &self,
        access_token: &str,
        post_id: &str,
    ) -> Result<DeleteOutcome, LinkedInError>;
}
