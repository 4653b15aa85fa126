//! Store record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use outbox_media::MediaRef;

/// An organization that publishes through the service.
#[derive(Debug, Clone, Serialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub redirect_uri: String,
    /// Set by the OAuth callback; absent until the org is connected.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub member_id: Option<String>,
    /// Company page id, required for organization-identity publishing.
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Whether the org has completed the OAuth connect flow.
    pub fn is_connected(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Input for creating an organization.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub organization_id: Option<String>,
}

/// Lifecycle status of a scheduled post.
///
/// Monotonic except `Scheduled -> Scheduled` on reschedule. Rows never
/// leave the table; terminal statuses are the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Scheduled,
    Posted,
    Cancelled,
    Failed,
    Deleted,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Posted => "posted",
            PostStatus::Cancelled => "cancelled",
            PostStatus::Failed => "failed",
            PostStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(PostStatus::Scheduled),
            "posted" => Some(PostStatus::Posted),
            "cancelled" => Some(PostStatus::Cancelled),
            "failed" => Some(PostStatus::Failed),
            "deleted" => Some(PostStatus::Deleted),
            _ => None,
        }
    }

    /// Whether the status is terminal (no timer may exist).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PostStatus::Scheduled)
    }
}

/// A deferred publish request and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub org_id: String,
    pub message: String,
    pub image_urls: Vec<String>,
    pub media_files: Vec<MediaRef>,
    pub post_as_organization: bool,
    /// Mutable only while status is `Scheduled`.
    pub due_at: DateTime<Utc>,
    /// Stable handle for the live timer; unique per job, never reused.
    pub job_name: String,
    pub status: PostStatus,
    /// Set only on the transition to `Posted`.
    pub platform_post_id: Option<String>,
    /// Set only on the transition to `Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating a scheduled post.
#[derive(Debug, Clone)]
pub struct NewScheduledPost {
    pub org_id: String,
    pub message: String,
    pub image_urls: Vec<String>,
    pub media_files: Vec<MediaRef>,
    pub post_as_organization: bool,
    pub due_at: DateTime<Utc>,
    pub job_name: String,
}

/// Metadata of one media asset that went out with a post. No bytes and
/// no staging path; posted records outlive the staged files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSummary {
    pub name: String,
    pub mime: String,
    pub size: u64,
}

impl From<&MediaRef> for MediaSummary {
    fn from(media_ref: &MediaRef) -> Self {
        Self {
            name: media_ref.original_name.clone(),
            mime: media_ref.mime.clone(),
            size: media_ref.size,
        }
    }
}

/// Append-only record of a completed publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedRecord {
    pub id: String,
    pub org_id: String,
    pub message: String,
    pub image_urls: Vec<String>,
    pub media_files: Vec<MediaSummary>,
    pub platform_post_id: String,
    pub posted_at: DateTime<Utc>,
    /// `posted`, or `failed` if completion errored after the platform
    /// accepted the post.
    pub status: PostStatus,
}

/// Summary counts for an organization.
#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub scheduled_posts: u64,
    pub published_today: u64,
    pub failed_posts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            PostStatus::Scheduled,
            PostStatus::Posted,
            PostStatus::Cancelled,
            PostStatus::Failed,
            PostStatus::Deleted,
        ] {
            assert_eq!(PostStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PostStatus::parse("nope"), None);
    }

    #[test]
    fn only_scheduled_is_non_terminal() {
        assert!(!PostStatus::Scheduled.is_terminal());
        assert!(PostStatus::Posted.is_terminal());
        assert!(PostStatus::Cancelled.is_terminal());
        assert!(PostStatus::Failed.is_terminal());
        assert!(PostStatus::Deleted.is_terminal());
    }

    #[test]
    fn secrets_never_serialize() {
        let org = Organization {
            id: "o1".into(),
            name: "Acme".into(),
            client_id: "cid".into(),
            client_secret: "shh".into(),
            redirect_uri: "https://example.test/cb".into(),
            access_token: Some("tok".into()),
            member_id: Some("m1".into()),
            organization_id: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&org).unwrap();
        assert!(!json.contains("shh"));
        assert!(!json.contains("tok"));
    }
}
