//! SQLite database for publishing records.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;
use uuid::Uuid;

use crate::{
    Analytics, MediaSummary, NewOrganization, NewScheduledPost, Organization, PostStatus,
    PostedRecord, ScheduledPost, StoreError,
};

/// SQLite-backed store for organizations, scheduled posts, and posted
/// content.
pub struct PostStore {
    conn: Mutex<Connection>,
}

impl PostStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self::init(conn)?;
        info!(path = %path.as_ref().display(), "post database initialized");
        Ok(store)
    }

    /// Open an in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // WAL for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                client_id TEXT NOT NULL,
                client_secret TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                access_token TEXT,
                member_id TEXT,
                organization_id TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scheduled_posts (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                message TEXT NOT NULL,
                image_urls TEXT NOT NULL DEFAULT '[]',
                media_files TEXT NOT NULL DEFAULT '[]',
                post_as_organization INTEGER NOT NULL DEFAULT 0,
                due_at TEXT NOT NULL,
                job_name TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL DEFAULT 'scheduled',
                platform_post_id TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                posted_at TEXT,
                deleted_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_scheduled_org ON scheduled_posts(org_id);
            CREATE INDEX IF NOT EXISTS idx_scheduled_status ON scheduled_posts(status);
            CREATE INDEX IF NOT EXISTS idx_scheduled_platform_id
                ON scheduled_posts(platform_post_id);

            CREATE TABLE IF NOT EXISTS posted_content (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                message TEXT NOT NULL,
                image_urls TEXT NOT NULL DEFAULT '[]',
                media_files TEXT NOT NULL DEFAULT '[]',
                platform_post_id TEXT NOT NULL,
                posted_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'posted'
            );
            CREATE INDEX IF NOT EXISTS idx_posted_org ON posted_content(org_id);
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // =========================================================================
    // Organizations
    // =========================================================================

    /// Create an organization.
    pub fn create_org(&self, new: NewOrganization) -> Result<Organization, StoreError> {
        let org = Organization {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            client_id: new.client_id,
            client_secret: new.client_secret,
            redirect_uri: new.redirect_uri,
            access_token: None,
            member_id: None,
            organization_id: new.organization_id,
            created_at: Utc::now(),
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO organizations
                (id, name, client_id, client_secret, redirect_uri, organization_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                org.id,
                org.name,
                org.client_id,
                org.client_secret,
                org.redirect_uri,
                org.organization_id,
                org.created_at.to_rfc3339(),
            ],
        )?;
        Ok(org)
    }

    /// List all organizations.
    pub fn list_orgs(&self) -> Result<Vec<Organization>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, client_id, client_secret, redirect_uri, access_token,
                    member_id, organization_id, created_at
             FROM organizations ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_org)?;
        let mut orgs = Vec::new();
        for row in rows {
            orgs.push(row??);
        }
        Ok(orgs)
    }

    /// Get an organization by id.
    pub fn get_org(&self, id: &str) -> Result<Option<Organization>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, client_id, client_secret, redirect_uri, access_token,
                    member_id, organization_id, created_at
             FROM organizations WHERE id = ?1",
            params![id],
            row_to_org,
        )
        .optional()?
        .transpose()
    }

    /// Delete an organization. Returns whether a row existed.
    pub fn delete_org(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM organizations WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    /// Record the OAuth connection for an organization.
    pub fn set_org_connection(
        &self,
        id: &str,
        access_token: &str,
        member_id: &str,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE organizations SET access_token = ?2, member_id = ?3 WHERE id = ?1",
            params![id, access_token, member_id],
        )?;
        Ok(n > 0)
    }

    // =========================================================================
    // Scheduled posts
    // =========================================================================

    /// Create a scheduled post with status `scheduled`.
    pub fn create_scheduled(&self, new: NewScheduledPost) -> Result<ScheduledPost, StoreError> {
        let post = ScheduledPost {
            id: Uuid::new_v4().to_string(),
            org_id: new.org_id,
            message: new.message,
            image_urls: new.image_urls,
            media_files: new.media_files,
            post_as_organization: new.post_as_organization,
            due_at: new.due_at,
            job_name: new.job_name,
            status: PostStatus::Scheduled,
            platform_post_id: None,
            error: None,
            created_at: Utc::now(),
            posted_at: None,
            deleted_at: None,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO scheduled_posts
                (id, org_id, message, image_urls, media_files, post_as_organization,
                 due_at, job_name, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                post.id,
                post.org_id,
                post.message,
                serde_json::to_string(&post.image_urls)?,
                serde_json::to_string(&post.media_files)?,
                post.post_as_organization,
                post.due_at.to_rfc3339(),
                post.job_name,
                post.status.as_str(),
                post.created_at.to_rfc3339(),
            ],
        )?;
        Ok(post)
    }

    /// Get a scheduled post by id.
    pub fn get_scheduled(&self, id: &str) -> Result<Option<ScheduledPost>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("{SCHEDULED_SELECT} WHERE id = ?1"),
            params![id],
            row_to_scheduled,
        )
        .optional()?
        .transpose()
    }

    /// List scheduled posts, optionally filtered by organization and/or
    /// status, sorted by due time ascending.
    pub fn list_scheduled(
        &self,
        org_id: Option<&str>,
        status: Option<PostStatus>,
    ) -> Result<Vec<ScheduledPost>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let status_str = status.map(|s| s.as_str());
        let mut stmt = conn.prepare(&format!(
            "{SCHEDULED_SELECT}
             WHERE (?1 IS NULL OR org_id = ?1)
               AND (?2 IS NULL OR status = ?2)
             ORDER BY due_at ASC"
        ))?;
        let rows = stmt.query_map(params![org_id, status_str], row_to_scheduled)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row??);
        }
        Ok(posts)
    }

    /// Transition a scheduled post to `posted`.
    pub fn mark_posted(
        &self,
        id: &str,
        platform_post_id: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE scheduled_posts
             SET status = 'posted', platform_post_id = ?2, posted_at = ?3, error = NULL
             WHERE id = ?1",
            params![id, platform_post_id, posted_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Transition a scheduled post to `failed` with an error message.
    pub fn mark_failed(&self, id: &str, error: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE scheduled_posts SET status = 'failed', error = ?2 WHERE id = ?1",
            params![id, error],
        )?;
        Ok(())
    }

    /// Transition a scheduled post to `cancelled`.
    pub fn mark_cancelled(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE scheduled_posts SET status = 'cancelled' WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Update the due time of a scheduled post (reschedule).
    pub fn update_due(&self, id: &str, due_at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE scheduled_posts SET due_at = ?2 WHERE id = ?1",
            params![id, due_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Mark any scheduled post carrying this platform post id as
    /// `deleted`. Returns whether a row matched.
    pub fn mark_deleted_by_platform_id(&self, platform_post_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE scheduled_posts
             SET status = 'deleted', deleted_at = ?2
             WHERE platform_post_id = ?1",
            params![platform_post_id, Utc::now().to_rfc3339()],
        )?;
        Ok(n > 0)
    }

    // =========================================================================
    // Posted content
    // =========================================================================

    /// Append a posted record.
    pub fn insert_posted(
        &self,
        org_id: &str,
        message: &str,
        image_urls: &[String],
        media_files: &[MediaSummary],
        platform_post_id: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<PostedRecord, StoreError> {
        let record = PostedRecord {
            id: Uuid::new_v4().to_string(),
            org_id: org_id.to_string(),
            message: message.to_string(),
            image_urls: image_urls.to_vec(),
            media_files: media_files.to_vec(),
            platform_post_id: platform_post_id.to_string(),
            posted_at,
            status: PostStatus::Posted,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO posted_content
                (id, org_id, message, image_urls, media_files, platform_post_id,
                 posted_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.org_id,
                record.message,
                serde_json::to_string(&record.image_urls)?,
                serde_json::to_string(&record.media_files)?,
                record.platform_post_id,
                record.posted_at.to_rfc3339(),
                record.status.as_str(),
            ],
        )?;
        Ok(record)
    }

    /// List posted records, optionally scoped to one organization,
    /// newest first.
    pub fn list_posted(&self, org_id: Option<&str>) -> Result<Vec<PostedRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, org_id, message, image_urls, media_files, platform_post_id,
                    posted_at, status
             FROM posted_content
             WHERE (?1 IS NULL OR org_id = ?1)
             ORDER BY posted_at DESC",
        )?;
        let rows = stmt.query_map(params![org_id], row_to_posted)?;
        rows.map(|r| r?).collect()
    }

    /// Flip a posted record to `failed` when the completion step errors
    /// after the platform accepted the post.
    pub fn mark_posted_failed(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE posted_content SET status = 'failed' WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Mark any posted record carrying this platform post id as
    /// `deleted`. Returns whether a row matched.
    pub fn mark_posted_deleted_by_platform_id(
        &self,
        platform_post_id: &str,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE posted_content SET status = 'deleted' WHERE platform_post_id = ?1",
            params![platform_post_id],
        )?;
        Ok(n > 0)
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    /// Summary counts for an organization: pending scheduled posts,
    /// publications that went out today (UTC), and failures across both
    /// scheduled posts and posted records.
    pub fn analytics(&self, org_id: &str) -> Result<Analytics, StoreError> {
        let conn = self.conn.lock().unwrap();

        let scheduled_posts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM scheduled_posts WHERE org_id = ?1 AND status = 'scheduled'",
            params![org_id],
            |row| row.get(0),
        )?;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let published_today: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posted_content
             WHERE org_id = ?1 AND status = 'posted' AND substr(posted_at, 1, 10) = ?2",
            params![org_id, today],
            |row| row.get(0),
        )?;

        let failed_scheduled: i64 = conn.query_row(
            "SELECT COUNT(*) FROM scheduled_posts WHERE org_id = ?1 AND status = 'failed'",
            params![org_id],
            |row| row.get(0),
        )?;
        let failed_posted: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posted_content WHERE org_id = ?1 AND status = 'failed'",
            params![org_id],
            |row| row.get(0),
        )?;

        Ok(Analytics {
            scheduled_posts: scheduled_posts as u64,
            published_today: published_today as u64,
            failed_posts: (failed_scheduled + failed_posted) as u64,
        })
    }
}

const SCHEDULED_SELECT: &str = "SELECT id, org_id, message, image_urls, media_files,
        post_as_organization, due_at, job_name, status, platform_post_id, error,
        created_at, posted_at, deleted_at
     FROM scheduled_posts";

fn row_to_org(row: &Row<'_>) -> rusqlite::Result<Result<Organization, StoreError>> {
    fn build(row: &Row<'_>) -> Result<Organization, StoreError> {
        let created_at: String = row.get(8).map_err(rusqlite_err)?;
        Ok(Organization {
            id: row.get(0).map_err(rusqlite_err)?,
            name: row.get(1).map_err(rusqlite_err)?,
            client_id: row.get(2).map_err(rusqlite_err)?,
            client_secret: row.get(3).map_err(rusqlite_err)?,
            redirect_uri: row.get(4).map_err(rusqlite_err)?,
            access_token: row.get(5).map_err(rusqlite_err)?,
            member_id: row.get(6).map_err(rusqlite_err)?,
            organization_id: row.get(7).map_err(rusqlite_err)?,
            created_at: parse_timestamp(&created_at)?,
        })
    }
    Ok(build(row))
}

fn row_to_scheduled(row: &Row<'_>) -> rusqlite::Result<Result<ScheduledPost, StoreError>> {
    fn build(row: &Row<'_>) -> Result<ScheduledPost, StoreError> {
        let image_urls: String = row.get(3).map_err(rusqlite_err)?;
        let media_files: String = row.get(4).map_err(rusqlite_err)?;
        let due_at: String = row.get(6).map_err(rusqlite_err)?;
        let status: String = row.get(8).map_err(rusqlite_err)?;
        let created_at: String = row.get(11).map_err(rusqlite_err)?;
        let posted_at: Option<String> = row.get(12).map_err(rusqlite_err)?;
        let deleted_at: Option<String> = row.get(13).map_err(rusqlite_err)?;

        Ok(ScheduledPost {
            id: row.get(0).map_err(rusqlite_err)?,
            org_id: row.get(1).map_err(rusqlite_err)?,
            message: row.get(2).map_err(rusqlite_err)?,
            image_urls: serde_json::from_str(&image_urls)?,
            media_files: serde_json::from_str(&media_files)?,
            post_as_organization: row.get(5).map_err(rusqlite_err)?,
            due_at: parse_timestamp(&due_at)?,
            job_name: row.get(7).map_err(rusqlite_err)?,
            status: PostStatus::parse(&status).ok_or(StoreError::UnknownStatus(status))?,
            platform_post_id: row.get(9).map_err(rusqlite_err)?,
            error: row.get(10).map_err(rusqlite_err)?,
            created_at: parse_timestamp(&created_at)?,
            posted_at: posted_at.as_deref().map(parse_timestamp).transpose()?,
            deleted_at: deleted_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
    Ok(build(row))
}

fn row_to_posted(row: &Row<'_>) -> rusqlite::Result<Result<PostedRecord, StoreError>> {
    fn build(row: &Row<'_>) -> Result<PostedRecord, StoreError> {
        let image_urls: String = row.get(3).map_err(rusqlite_err)?;
        let media_files: String = row.get(4).map_err(rusqlite_err)?;
        let posted_at: String = row.get(6).map_err(rusqlite_err)?;
        let status: String = row.get(7).map_err(rusqlite_err)?;
        Ok(PostedRecord {
            id: row.get(0).map_err(rusqlite_err)?,
            org_id: row.get(1).map_err(rusqlite_err)?,
            message: row.get(2).map_err(rusqlite_err)?,
            image_urls: serde_json::from_str(&image_urls)?,
            media_files: serde_json::from_str(&media_files)?,
            platform_post_id: row.get(5).map_err(rusqlite_err)?,
            posted_at: parse_timestamp(&posted_at)?,
            status: PostStatus::parse(&status).ok_or(StoreError::UnknownStatus(status))?,
        })
    }
    Ok(build(row))
}

fn rusqlite_err(e: rusqlite::Error) -> StoreError {
    StoreError::Sqlite(e)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> PostStore {
        PostStore::open_in_memory().unwrap()
    }

    fn new_org(store: &PostStore, name: &str) -> Organization {
        store
            .create_org(NewOrganization {
                name: name.to_string(),
                client_id: "cid".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "https://example.test/cb".to_string(),
                organization_id: None,
            })
            .unwrap()
    }

    fn new_post(store: &PostStore, org_id: &str, due_at: DateTime<Utc>) -> ScheduledPost {
        store
            .create_scheduled(NewScheduledPost {
                org_id: org_id.to_string(),
                message: "hello".to_string(),
                image_urls: vec!["https://img.example/1.png".to_string()],
                media_files: Vec::new(),
                post_as_organization: false,
                due_at,
                job_name: format!("publish-{}", Uuid::new_v4()),
            })
            .unwrap()
    }

    #[test]
    fn org_lifecycle() {
        let store = store();
        let org = new_org(&store, "Acme");

        let fetched = store.get_org(&org.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Acme");
        assert!(!fetched.is_connected());

        assert!(store.set_org_connection(&org.id, "tok", "member-1").unwrap());
        let fetched = store.get_org(&org.id).unwrap().unwrap();
        assert!(fetched.is_connected());
        assert_eq!(fetched.member_id.as_deref(), Some("member-1"));

        assert_eq!(store.list_orgs().unwrap().len(), 1);
        assert!(store.delete_org(&org.id).unwrap());
        assert!(!store.delete_org(&org.id).unwrap());
        assert!(store.get_org(&org.id).unwrap().is_none());
    }

    #[test]
    fn scheduled_round_trip_and_ordering() {
        let store = store();
        let org = new_org(&store, "Acme");
        let now = Utc::now();

        let later = new_post(&store, &org.id, now + Duration::hours(2));
        let sooner = new_post(&store, &org.id, now + Duration::hours(1));

        let listed = store.list_scheduled(Some(&org.id), None).unwrap();
        assert_eq!(listed.len(), 2);
        // Sorted by due time ascending, not insertion order.
        assert_eq!(listed[0].id, sooner.id);
        assert_eq!(listed[1].id, later.id);

        let fetched = store.get_scheduled(&sooner.id).unwrap().unwrap();
        assert_eq!(fetched.status, PostStatus::Scheduled);
        assert_eq!(fetched.image_urls.len(), 1);
        assert_eq!(fetched.job_name, sooner.job_name);
    }

    #[test]
    fn status_filters() {
        let store = store();
        let org = new_org(&store, "Acme");
        let due = Utc::now() + Duration::hours(1);

        let a = new_post(&store, &org.id, due);
        let b = new_post(&store, &org.id, due);
        new_post(&store, &org.id, due);

        store.mark_posted(&a.id, "urn:li:share:1", Utc::now()).unwrap();
        store.mark_failed(&b.id, "boom").unwrap();

        let scheduled = store
            .list_scheduled(Some(&org.id), Some(PostStatus::Scheduled))
            .unwrap();
        assert_eq!(scheduled.len(), 1);

        let failed = store
            .list_scheduled(Some(&org.id), Some(PostStatus::Failed))
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error.as_deref(), Some("boom"));

        let posted = store
            .list_scheduled(None, Some(PostStatus::Posted))
            .unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].platform_post_id.as_deref(), Some("urn:li:share:1"));
        assert!(posted[0].posted_at.is_some());
    }

    #[test]
    fn reschedule_updates_due_only() {
        let store = store();
        let org = new_org(&store, "Acme");
        let post = new_post(&store, &org.id, Utc::now() + Duration::hours(1));

        let new_due = Utc::now() + Duration::hours(5);
        store.update_due(&post.id, new_due).unwrap();

        let fetched = store.get_scheduled(&post.id).unwrap().unwrap();
        assert_eq!(fetched.due_at.timestamp(), new_due.timestamp());
        assert_eq!(fetched.status, PostStatus::Scheduled);
        assert_eq!(fetched.job_name, post.job_name);
    }

    #[test]
    fn delete_by_platform_id() {
        let store = store();
        let org = new_org(&store, "Acme");
        let post = new_post(&store, &org.id, Utc::now() + Duration::hours(1));
        store.mark_posted(&post.id, "urn:li:share:42", Utc::now()).unwrap();

        assert!(store.mark_deleted_by_platform_id("urn:li:share:42").unwrap());

        let fetched = store.get_scheduled(&post.id).unwrap().unwrap();
        assert_eq!(fetched.status, PostStatus::Deleted);
        assert!(fetched.deleted_at.is_some());

        assert!(!store.mark_deleted_by_platform_id("urn:li:share:999").unwrap());
    }

    #[test]
    fn posted_records_and_analytics() {
        let store = store();
        let org = new_org(&store, "Acme");
        let other = new_org(&store, "Globex");

        new_post(&store, &org.id, Utc::now() + Duration::hours(1));
        let failed_job = new_post(&store, &org.id, Utc::now() + Duration::hours(1));
        store.mark_failed(&failed_job.id, "boom").unwrap();

        let record = store
            .insert_posted(&org.id, "hi", &[], &[], "urn:li:share:7", Utc::now())
            .unwrap();
        store
            .insert_posted(
                &org.id,
                "old",
                &[],
                &[],
                "urn:li:share:8",
                Utc::now() - Duration::days(2),
            )
            .unwrap();
        store
            .insert_posted(&other.id, "other org", &[], &[], "urn:li:share:9", Utc::now())
            .unwrap();

        let records = store.list_posted(Some(&org.id)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].platform_post_id, "urn:li:share:7");
        assert_eq!(store.list_posted(None).unwrap().len(), 3);

        let analytics = store.analytics(&org.id).unwrap();
        assert_eq!(analytics.scheduled_posts, 1);
        assert_eq!(analytics.published_today, 1);
        assert_eq!(analytics.failed_posts, 1);

        store.mark_posted_failed(&record.id).unwrap();
        let analytics = store.analytics(&org.id).unwrap();
        assert_eq!(analytics.published_today, 0);
        assert_eq!(analytics.failed_posts, 2);
    }
}
