//! Publish orchestrator implementation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use outbox_linkedin::{
    AuthContext, DraftPost, Gateway, ImageUpload, PublishTarget, normalize_post_id,
};
use outbox_media::{LoadedMedia, MediaStager, UploadedFile};
use outbox_scheduler::Scheduler;
use outbox_store::{
    Analytics, NewScheduledPost, Organization, PostStatus, PostStore, ScheduledPost,
};

use crate::PublishError;
use crate::strategy::{StrategyOutcome, outcome_of, strategy_chain};

/// How long past its due time a persisted job may still fire after a
/// restart. Beyond this the job is marked failed instead.
const DEFAULT_OVERDUE_GRACE_MINUTES: i64 = 10;

/// Input for an immediate or deferred publish.
#[derive(Debug, Default)]
pub struct PublishRequest {
    pub org_id: String,
    pub message: String,
    pub image_urls: Vec<String>,
    pub post_as_organization: bool,
    pub files: Vec<UploadedFile>,
}

/// Outcome of an immediate publish.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    pub platform_post_id: String,
    /// Label of the API target that accepted the post.
    pub target: &'static str,
}

/// Outcome of a remote delete.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReceipt {
    pub platform_post_id: String,
    pub method: &'static str,
    pub already_deleted: bool,
    /// Whether any local record was flipped to `deleted`.
    pub record_updated: bool,
}

/// Counts from the startup reconciliation pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RecoveryReport {
    /// Future jobs re-armed at their original due time.
    pub rearmed: usize,
    /// Overdue jobs within the grace window, armed to fire immediately.
    pub fired: usize,
    /// Jobs too far overdue, marked failed.
    pub expired: usize,
}

/// Orchestrates the full lifecycle of publications: immediate publishes
/// with strategy fallback, deferred publishes armed as timers, and the
/// status bookkeeping around both.
pub struct Publisher {
    store: Arc<PostStore>,
    scheduler: Arc<Scheduler>,
    media: Arc<MediaStager>,
    gateway: Arc<dyn Gateway>,
    overdue_grace: Duration,
}

impl Publisher {
    pub fn new(
        store: Arc<PostStore>,
        scheduler: Arc<Scheduler>,
        media: Arc<MediaStager>,
        gateway: Arc<dyn Gateway>,
    ) -> Self {
        Self {
            store,
            scheduler,
            media,
            gateway,
            overdue_grace: Duration::minutes(DEFAULT_OVERDUE_GRACE_MINUTES),
        }
    }

    pub fn with_overdue_grace(mut self, grace: Duration) -> Self {
        self.overdue_grace = grace;
        self
    }

    /// Publish immediately, walking the strategy chain.
    #[tracing::instrument(skip(self, request), fields(org_id = %request.org_id))]
    pub async fn publish_now(
        &self,
        request: PublishRequest,
    ) -> Result<PublishReceipt, PublishError> {
        validate_message(&request.message)?;
        let org = self.connected_org(&request.org_id)?;

        let draft = DraftPost {
            message: request.message,
            image_urls: request.image_urls,
            images: request.files.into_iter().map(upload_to_image).collect(),
        };

        let (platform_post_id, target) =
            self.attempt_chain(&org, request.post_as_organization, &draft).await?;

        if let Err(err) = self.store.insert_posted(
            &org.id,
            &draft.message,
            &draft.image_urls,
            &summarize_images(&draft.images),
            &platform_post_id,
            Utc::now(),
        ) {
            error!(error = %err, platform_post_id = %platform_post_id, "publish succeeded but recording it failed");
        }

        info!(platform_post_id = %platform_post_id, target, "published");
        Ok(PublishReceipt {
            platform_post_id,
            target,
        })
    }

    /// Persist a deferred publish and arm its timer.
    ///
    /// Validation happens before any side effect: an invalid request
    /// leaves no staged files, no record, and no timer.
    pub async fn schedule(
        self: &Arc<Self>,
        request: PublishRequest,
        due_at: DateTime<Utc>,
    ) -> Result<ScheduledPost, PublishError> {
        validate_message(&request.message)?;
        if due_at <= Utc::now() {
            return Err(PublishError::Validation(
                "scheduled time must be in the future".to_string(),
            ));
        }
        let org = self
            .store
            .get_org(&request.org_id)?
            .ok_or_else(|| PublishError::OrgNotFound(request.org_id.clone()))?;

        let media_files = self.media.stage(request.files).await?;
        let post = self.store.create_scheduled(NewScheduledPost {
            org_id: org.id,
            message: request.message,
            image_urls: request.image_urls,
            media_files,
            post_as_organization: request.post_as_organization,
            due_at,
            job_name: format!("publish-{}", Uuid::new_v4()),
        })?;

        self.arm_job(&post).await?;
        info!(post_id = %post.id, due_at = %post.due_at, "scheduled publish");
        Ok(post)
    }

    /// Run one scheduled job now. Invoked by the timer when it fires,
    /// and by recovery for overdue jobs.
    ///
    /// Reloads the record first and proceeds only if it is still
    /// `scheduled`; a job cancelled or already resolved since the timer
    /// was armed is skipped.
    #[tracing::instrument(skip(self))]
    pub async fn fire(&self, post_id: &str) -> Result<(), PublishError> {
        let post = self
            .store
            .get_scheduled(post_id)?
            .ok_or_else(|| PublishError::JobNotFound(post_id.to_string()))?;
        if post.status != PostStatus::Scheduled {
            info!(status = post.status.as_str(), "skipping fire; job no longer scheduled");
            return Ok(());
        }

        let org = match self.connected_org(&post.org_id) {
            Ok(org) => org,
            Err(err) => {
                self.store.mark_failed(&post.id, &err.to_string())?;
                return Err(err);
            }
        };

        let mut images = Vec::new();
        if !post.media_files.is_empty() {
            // Any failure past this point must resolve the job; a bare
            // error would leave it scheduled with no timer.
            let report = match self.media.load(&post.media_files).await {
                Ok(report) => report,
                Err(err) => {
                    let err = PublishError::from(err);
                    self.store.mark_failed(&post.id, &err.to_string())?;
                    return Err(err);
                }
            };
            if report.loaded.is_empty() && post.image_urls.is_empty() {
                let err = PublishError::MediaUnavailable;
                self.store.mark_failed(&post.id, &err.to_string())?;
                return Err(err);
            }
            images = report.loaded.into_iter().map(loaded_to_image).collect();
        }

        let draft = DraftPost {
            message: post.message.clone(),
            image_urls: post.image_urls.clone(),
            images,
        };

        match self.attempt_chain(&org, post.post_as_organization, &draft).await {
            Ok((platform_post_id, target)) => {
                let posted_at = Utc::now();
                let completion =
                    self.store.mark_posted(&post.id, &platform_post_id, posted_at);
                let record = self.store.insert_posted(
                    &org.id,
                    &draft.message,
                    &draft.image_urls,
                    &summarize_refs(&post.media_files),
                    &platform_post_id,
                    posted_at,
                );
                if let Err(err) = &record {
                    error!(error = %err, platform_post_id = %platform_post_id, "posted but recording the publication failed");
                }
                if let Err(err) = completion {
                    // The platform accepted the post, so the job must
                    // still end terminal here; left scheduled it would
                    // be re-armed at the next startup and published a
                    // second time.
                    error!(error = %err, platform_post_id = %platform_post_id, "posted but the status update failed");
                    self.store.mark_failed(
                        &post.id,
                        &format!(
                            "published as {platform_post_id} but the status update failed: {err}"
                        ),
                    )?;
                    if let Ok(record) = &record {
                        if let Err(err) = self.store.mark_posted_failed(&record.id) {
                            error!(error = %err, record_id = %record.id, "could not flag the posted record");
                        }
                    }
                }
                self.media.release(&post.media_files).await;
                info!(platform_post_id = %platform_post_id, target, "scheduled publish went out");
                Ok(())
            }
            Err(err) => {
                // Staged media stays on disk so a later manual retry
                // still has the files.
                self.store.mark_failed(&post.id, &err.to_string())?;
                Err(err)
            }
        }
    }

    /// Cancel a pending scheduled post.
    ///
    /// Already-cancelled jobs succeed idempotently. Jobs in any other
    /// terminal state are rejected. A job whose timer has already
    /// started firing is rejected too; the fire wins.
    pub async fn cancel(&self, post_id: &str) -> Result<ScheduledPost, PublishError> {
        let post = self
            .store
            .get_scheduled(post_id)?
            .ok_or_else(|| PublishError::JobNotFound(post_id.to_string()))?;

        match post.status {
            PostStatus::Cancelled => return Ok(post),
            PostStatus::Scheduled => {}
            other => {
                return Err(PublishError::InvalidState {
                    id: post.id,
                    status: other.as_str().to_string(),
                });
            }
        }

        if !self.scheduler.cancel(&post.job_name).await {
            // No live timer under a scheduled status means the timer
            // has deregistered itself and the fire body is running.
            return Err(PublishError::InvalidState {
                id: post.id,
                status: "firing".to_string(),
            });
        }

        self.store.mark_cancelled(&post.id)?;
        self.media.release(&post.media_files).await;
        info!(post_id = %post.id, "cancelled scheduled publish");
        self.store
            .get_scheduled(post_id)?
            .ok_or_else(|| PublishError::JobNotFound(post_id.to_string()))
    }

    /// Move a pending scheduled post to a new future time.
    pub async fn reschedule(
        self: &Arc<Self>,
        post_id: &str,
        new_due_at: DateTime<Utc>,
    ) -> Result<ScheduledPost, PublishError> {
        let post = self
            .store
            .get_scheduled(post_id)?
            .ok_or_else(|| PublishError::JobNotFound(post_id.to_string()))?;
        if post.status != PostStatus::Scheduled {
            return Err(PublishError::InvalidState {
                id: post.id,
                status: post.status.as_str().to_string(),
            });
        }
        if new_due_at <= Utc::now() {
            return Err(PublishError::Validation(
                "scheduled time must be in the future".to_string(),
            ));
        }

        if !self
            .scheduler
            .rearm(&post.job_name, new_due_at, self.fire_task(&post.id))
            .await
        {
            // No live timer under a scheduled status means the timer
            // has deregistered itself and the fire body is running.
            // Same rule as cancel: the fire wins.
            return Err(PublishError::InvalidState {
                id: post.id,
                status: "firing".to_string(),
            });
        }
        self.store.update_due(&post.id, new_due_at)?;
        info!(post_id = %post.id, due_at = %new_due_at, "rescheduled publish");
        self.store
            .get_scheduled(post_id)?
            .ok_or_else(|| PublishError::JobNotFound(post_id.to_string()))
    }

    /// Delete a post on the platform and flip matching local records.
    ///
    /// A gateway failure propagates without touching local state; the
    /// platform's not-found answer counts as success.
    pub async fn delete_remote(
        &self,
        org_id: &str,
        post_id: &str,
    ) -> Result<DeleteReceipt, PublishError> {
        let org = self.connected_org(org_id)?;
        let token = org
            .access_token
            .as_deref()
            .ok_or_else(|| PublishError::NotConnected(org.id.clone()))?;

        let outcome = self.gateway.delete_post(token, post_id).await?;

        let urn = normalize_post_id(post_id);
        let mut record_updated = self.store.mark_deleted_by_platform_id(&urn)?;
        record_updated |= self.store.mark_posted_deleted_by_platform_id(&urn)?;
        if urn != post_id {
            record_updated |= self.store.mark_deleted_by_platform_id(post_id)?;
            record_updated |= self.store.mark_posted_deleted_by_platform_id(post_id)?;
        }

        info!(
            platform_post_id = %urn,
            already_deleted = outcome.already_deleted,
            record_updated,
            "deleted remote post"
        );
        Ok(DeleteReceipt {
            platform_post_id: urn,
            method: outcome.method,
            already_deleted: outcome.already_deleted,
            record_updated,
        })
    }

    /// Startup reconciliation over persisted `scheduled` rows: re-arm
    /// future jobs, fire recently-overdue ones, fail the rest.
    pub async fn recover(self: &Arc<Self>) -> Result<RecoveryReport, PublishError> {
        let pending = self.store.list_scheduled(None, Some(PostStatus::Scheduled))?;
        let mut report = RecoveryReport::default();
        let now = Utc::now();

        for post in pending {
            if post.due_at > now {
                self.arm_job(&post).await?;
                report.rearmed += 1;
            } else if now - post.due_at <= self.overdue_grace {
                // Past-due timers fire on the next runtime tick.
                self.arm_job(&post).await?;
                report.fired += 1;
            } else {
                self.store.mark_failed(
                    &post.id,
                    "missed scheduled time while the service was offline",
                )?;
                warn!(post_id = %post.id, due_at = %post.due_at, "expired overdue job");
                report.expired += 1;
            }
        }

        info!(
            rearmed = report.rearmed,
            fired = report.fired,
            expired = report.expired,
            "recovery pass complete"
        );
        Ok(report)
    }

    /// Summary counts for an organization.
    pub fn analytics(&self, org_id: &str) -> Result<Analytics, PublishError> {
        self.store
            .get_org(org_id)?
            .ok_or_else(|| PublishError::OrgNotFound(org_id.to_string()))?;
        Ok(self.store.analytics(org_id)?)
    }

    async fn arm_job(self: &Arc<Self>, post: &ScheduledPost) -> Result<(), PublishError> {
        self.scheduler
            .arm(&post.job_name, post.due_at, self.fire_task(&post.id))
            .await?;
        Ok(())
    }

    /// The future a timer runs: reload and fire by id, so the timer
    /// never acts on a stale copy of the record.
    fn fire_task(self: &Arc<Self>, post_id: &str) -> outbox_scheduler::TimerTask {
        let publisher = Arc::clone(self);
        let post_id = post_id.to_string();
        Box::pin(async move {
            if let Err(err) = publisher.fire(&post_id).await {
                error!(post_id = %post_id, error = %err, "scheduled publish failed");
            }
        })
    }

    /// Walk the strategy chain for one draft, returning the first
    /// success. Fatal outcomes abort the chain; retryable ones move to
    /// the next target; an exhausted chain returns the last error.
    async fn attempt_chain(
        &self,
        org: &Organization,
        post_as_organization: bool,
        draft: &DraftPost,
    ) -> Result<(String, &'static str), PublishError> {
        let token = org
            .access_token
            .as_deref()
            .ok_or_else(|| PublishError::NotConnected(org.id.clone()))?;
        let auth = AuthContext {
            access_token: token.to_string(),
            member_id: org.member_id.clone(),
            organization_id: org.organization_id.clone(),
        };

        let chain = strategy_chain(post_as_organization, org);
        let mut last_err = None;
        for target in chain {
            match outcome_of(self.gateway.publish(&auth, target, draft).await) {
                StrategyOutcome::Success(platform_post_id) => {
                    return Ok((platform_post_id, target_label(target)));
                }
                StrategyOutcome::Retryable(err) => {
                    warn!(target = target_label(target), error = %err, "publish target failed, trying next");
                    last_err = Some(err);
                }
                StrategyOutcome::Fatal(err) => {
                    error!(target = target_label(target), error = %err, "publish failed fatally");
                    return Err(err.into());
                }
            }
        }

        match last_err {
            Some(err) => Err(err.into()),
            None => Err(PublishError::Validation(
                "no publish strategy available".to_string(),
            )),
        }
    }

    fn connected_org(&self, org_id: &str) -> Result<Organization, PublishError> {
        let org = self
            .store
            .get_org(org_id)?
            .ok_or_else(|| PublishError::OrgNotFound(org_id.to_string()))?;
        if !org.is_connected() {
            return Err(PublishError::NotConnected(org.id));
        }
        Ok(org)
    }
}

fn validate_message(message: &str) -> Result<(), PublishError> {
    if message.trim().is_empty() {
        return Err(PublishError::Validation("message is required".to_string()));
    }
    Ok(())
}

fn target_label(target: PublishTarget) -> &'static str {
    match target {
        PublishTarget::MemberPosts => "member_posts",
        PublishTarget::MemberUgc => "member_ugc",
        PublishTarget::OrganizationPosts => "organization_posts",
    }
}

fn upload_to_image(file: UploadedFile) -> ImageUpload {
    ImageUpload {
        bytes: file.bytes,
        mime: file.mime,
        name: file.original_name,
    }
}

fn loaded_to_image(media: LoadedMedia) -> ImageUpload {
    ImageUpload {
        bytes: media.bytes,
        mime: media.mime,
        name: media.original_name,
    }
}

fn summarize_images(images: &[ImageUpload]) -> Vec<outbox_store::MediaSummary> {
    images
        .iter()
        .map(|img| outbox_store::MediaSummary {
            name: img.name.clone(),
            mime: img.mime.clone(),
            size: img.bytes.len() as u64,
        })
        .collect()
}

fn summarize_refs(refs: &[outbox_media::MediaRef]) -> Vec<outbox_store::MediaSummary> {
    refs.iter().map(outbox_store::MediaSummary::from).collect()
}
