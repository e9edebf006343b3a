//! Database operations for Crosscast
//!
//! Holds the article snapshots the engine reads, connected social accounts,
//! generated previews, and the durable scheduled-post list. Scheduled posts
//! are updated per-row by stable id with a version check, so a concurrent
//! duplicate trigger cannot clobber another writer.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::types::{
    Article, Channel, Preview, ScheduleStatus, ScheduledPost, SocialAccount,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection and run migrations.
    ///
    /// `":memory:"` opens a transient in-memory database (used by tests).
    pub async fn new(db_path: &str) -> Result<Self> {
        let db_url = if db_path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            let expanded_path = shellexpand::tilde(db_path).to_string();
            let path = Path::new(&expanded_path);

            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
                }
            }

            // Forward slashes keep the SQLite URL valid on Windows too;
            // mode=rwc creates the file if it does not exist.
            format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"))
        };

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Articles
    // ------------------------------------------------------------------

    pub async fn upsert_article(&self, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles (id, title, slug, excerpt, body, main_image_url)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                slug = excluded.slug,
                excerpt = excluded.excerpt,
                body = excluded.body,
                main_image_url = excluded.main_image_url
            "#,
        )
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.slug)
        .bind(&article.excerpt)
        .bind(&article.body)
        .bind(&article.main_image_url)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_article(&self, article_id: &str) -> Result<Option<Article>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, slug, excerpt, body, main_image_url
            FROM articles WHERE id = ?
            "#,
        )
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.map(|r| Article {
            id: r.get("id"),
            title: r.get("title"),
            slug: r.get("slug"),
            excerpt: r.get("excerpt"),
            body: r.get("body"),
            main_image_url: r.get("main_image_url"),
        }))
    }

    // ------------------------------------------------------------------
    // Social accounts
    // ------------------------------------------------------------------

    pub async fn upsert_social_account(&self, account: &SocialAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO social_accounts (
                id, platform, access_token, refresh_token, user_access_token,
                page_id, profile_id, ig_business_account_id, expires_at, connected_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                platform = excluded.platform,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                user_access_token = excluded.user_access_token,
                page_id = excluded.page_id,
                profile_id = excluded.profile_id,
                ig_business_account_id = excluded.ig_business_account_id,
                expires_at = excluded.expires_at,
                connected_at = excluded.connected_at
            "#,
        )
        .bind(&account.id)
        .bind(account.platform.as_str())
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(&account.user_access_token)
        .bind(&account.page_id)
        .bind(&account.profile_id)
        .bind(&account.ig_business_account_id)
        .bind(account.expires_at)
        .bind(account.connected_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_social_account(&self, account_id: &str) -> Result<Option<SocialAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, platform, access_token, refresh_token, user_access_token,
                   page_id, profile_id, ig_business_account_id, expires_at, connected_at
            FROM social_accounts WHERE id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(row_to_account).transpose()
    }

    /// The connected account for a channel, if any. When several accounts
    /// are connected for the same platform the most recently connected one
    /// wins.
    pub async fn account_for_channel(&self, channel: Channel) -> Result<Option<SocialAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, platform, access_token, refresh_token, user_access_token,
                   page_id, profile_id, ig_business_account_id, expires_at, connected_at
            FROM social_accounts
            WHERE platform = ?
            ORDER BY connected_at DESC
            LIMIT 1
            "#,
        )
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(row_to_account).transpose()
    }

    /// Remove a connected account entirely. No soft-delete.
    pub async fn delete_social_account(&self, account_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM social_accounts WHERE id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Scheduled posts
    // ------------------------------------------------------------------

    pub async fn insert_scheduled_post(&self, post: &ScheduledPost) -> Result<()> {
        let hashtags = serde_json::to_string(&post.hashtags)
            .map_err(|e| crate::error::CrosscastError::InvalidInput(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_posts (
                id, article_id, account_id, channel, content, image_url, hashtags,
                scheduled_at, status, platform_post_id, error, published_at, version
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.article_id)
        .bind(&post.account_id)
        .bind(post.channel.as_str())
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(hashtags)
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(&post.platform_post_id)
        .bind(&post.error)
        .bind(post.published_at)
        .bind(post.version)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_scheduled_post(&self, id: &str) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query(
            r#"
            SELECT id, article_id, account_id, channel, content, image_url, hashtags,
                   scheduled_at, status, platform_post_id, error, published_at, version
            FROM scheduled_posts WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(row_to_scheduled_post).transpose()
    }

    /// All schedule entries for an article, oldest first. This is the
    /// schedule list the editor sees, including failed entries and their
    /// error messages.
    pub async fn list_scheduled_posts(&self, article_id: &str) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, article_id, account_id, channel, content, image_url, hashtags,
                   scheduled_at, status, platform_post_id, error, published_at, version
            FROM scheduled_posts
            WHERE article_id = ?
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_scheduled_post).collect()
    }

    /// Entries still in `scheduled` status whose time has come.
    pub async fn due_scheduled_posts(&self, now: i64) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, article_id, account_id, channel, content, image_url, hashtags,
                   scheduled_at, status, platform_post_id, error, published_at, version
            FROM scheduled_posts
            WHERE status = 'scheduled' AND scheduled_at <= ?
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_scheduled_post).collect()
    }

    /// Does the article already have a pending entry for this channel?
    pub async fn has_scheduled(&self, article_id: &str, channel: Channel) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM scheduled_posts
            WHERE article_id = ? AND channel = ? AND status = 'scheduled'
            "#,
        )
        .bind(article_id)
        .bind(channel.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.get::<i64, _>("n") > 0)
    }

    /// Transition a scheduled entry to `published`. The update carries the
    /// version the caller read and a `status = 'scheduled'` predicate, so it
    /// applies at most once.
    pub async fn mark_published(
        &self,
        id: &str,
        expected_version: i64,
        platform_post_id: &str,
        published_at: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'published', platform_post_id = ?, published_at = ?,
                error = NULL, version = version + 1
            WHERE id = ? AND status = 'scheduled' AND version = ?
            "#,
        )
        .bind(platform_post_id)
        .bind(published_at)
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        self.check_status_write(id, result.rows_affected()).await
    }

    /// Transition a scheduled entry to `failed`, recording the error as data.
    pub async fn mark_failed(&self, id: &str, expected_version: i64, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'failed', error = ?, platform_post_id = NULL,
                published_at = NULL, version = version + 1
            WHERE id = ? AND status = 'scheduled' AND version = ?
            "#,
        )
        .bind(error)
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        self.check_status_write(id, result.rows_affected()).await
    }

    async fn check_status_write(&self, id: &str, rows_affected: u64) -> Result<()> {
        if rows_affected == 1 {
            return Ok(());
        }

        match self.get_scheduled_post(id).await? {
            Some(post) if post.status == ScheduleStatus::Scheduled => {
                Err(StoreError::Conflict(format!(
                    "scheduled post {} was modified concurrently",
                    id
                ))
                .into())
            }
            _ => Err(StoreError::AlreadyProcessed(
                "scheduled post not found or already processed".to_string(),
            )
            .into()),
        }
    }

    // ------------------------------------------------------------------
    // Previews
    // ------------------------------------------------------------------

    pub async fn save_preview(&self, preview: &Preview) -> Result<()> {
        let content = serde_json::to_string(&preview.content)
            .map_err(|e| crate::error::CrosscastError::InvalidInput(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO previews (article_id, target, content, generated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(article_id, target) DO UPDATE SET
                content = excluded.content,
                generated_at = excluded.generated_at
            "#,
        )
        .bind(&preview.article_id)
        .bind(preview.target.as_str())
        .bind(content)
        .bind(preview.generated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_previews(&self, article_id: &str) -> Result<Vec<Preview>> {
        let rows = sqlx::query(
            r#"
            SELECT article_id, target, content, generated_at
            FROM previews WHERE article_id = ?
            ORDER BY target ASC
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter()
            .map(|r| {
                let target: String = r.get("target");
                let content: String = r.get("content");
                Ok(Preview {
                    article_id: r.get("article_id"),
                    target: serde_json::from_str(&format!("\"{}\"", target))
                        .map_err(|e| crate::error::CrosscastError::InvalidInput(e.to_string()))?,
                    content: serde_json::from_str(&content)
                        .map_err(|e| crate::error::CrosscastError::InvalidInput(e.to_string()))?,
                    generated_at: r.get("generated_at"),
                })
            })
            .collect()
    }
}

fn row_to_account(r: sqlx::sqlite::SqliteRow) -> Result<SocialAccount> {
    let platform: String = r.get("platform");
    Ok(SocialAccount {
        id: r.get("id"),
        platform: platform.parse()?,
        access_token: r.get("access_token"),
        refresh_token: r.get("refresh_token"),
        user_access_token: r.get("user_access_token"),
        page_id: r.get("page_id"),
        profile_id: r.get("profile_id"),
        ig_business_account_id: r.get("ig_business_account_id"),
        expires_at: r.get("expires_at"),
        connected_at: r.get("connected_at"),
    })
}

fn row_to_scheduled_post(r: sqlx::sqlite::SqliteRow) -> Result<ScheduledPost> {
    let channel: String = r.get("channel");
    let status: String = r.get("status");
    let hashtags: Option<String> = r.get("hashtags");
    let hashtags = match hashtags {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| crate::error::CrosscastError::InvalidInput(e.to_string()))?,
        None => Vec::new(),
    };

    Ok(ScheduledPost {
        id: r.get("id"),
        article_id: r.get("article_id"),
        account_id: r.get("account_id"),
        channel: channel.parse()?,
        content: r.get("content"),
        image_url: r.get("image_url"),
        hashtags,
        scheduled_at: r.get("scheduled_at"),
        status: ScheduleStatus::parse(&status),
        platform_post_id: r.get("platform_post_id"),
        error: r.get("error"),
        published_at: r.get("published_at"),
        version: r.get("version"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new(":memory:").await.unwrap()
    }

    fn account(id: &str, channel: Channel) -> SocialAccount {
        SocialAccount {
            id: id.to_string(),
            platform: channel,
            access_token: "token".to_string(),
            refresh_token: None,
            user_access_token: None,
            page_id: None,
            profile_id: None,
            ig_business_account_id: None,
            expires_at: 2_000_000_000,
            connected_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_article_round_trip() {
        let db = test_db().await;

        let article = Article {
            id: "article-1".to_string(),
            title: "Hello".to_string(),
            slug: Some("hello".to_string()),
            excerpt: "An excerpt".to_string(),
            body: "Body text".to_string(),
            main_image_url: Some("https://cdn.example.com/a.jpg".to_string()),
        };

        db.upsert_article(&article).await.unwrap();
        let fetched = db.get_article("article-1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Hello");
        assert_eq!(fetched.slug, Some("hello".to_string()));

        assert!(db.get_article("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_account_for_channel_prefers_latest_connection() {
        let db = test_db().await;

        let mut older = account("acct-old", Channel::Facebook);
        older.connected_at = 1_600_000_000;
        let newer = account("acct-new", Channel::Facebook);

        db.upsert_social_account(&older).await.unwrap();
        db.upsert_social_account(&newer).await.unwrap();

        let found = db
            .account_for_channel(Channel::Facebook)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "acct-new");

        assert!(db
            .account_for_channel(Channel::Linkedin)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_social_account_is_hard_delete() {
        let db = test_db().await;
        db.upsert_social_account(&account("acct-1", Channel::Linkedin))
            .await
            .unwrap();

        db.delete_social_account("acct-1").await.unwrap();
        assert!(db.get_social_account("acct-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scheduled_post_round_trip_with_hashtags() {
        let db = test_db().await;

        let mut post = ScheduledPost::new(
            "article-1".to_string(),
            "acct-1".to_string(),
            Channel::Instagram,
            "caption".to_string(),
            1_900_000_000,
        );
        post.image_url = Some("https://cdn.example.com/a.jpg".to_string());
        post.hashtags = vec!["one".to_string(), "two".to_string()];

        db.insert_scheduled_post(&post).await.unwrap();
        let fetched = db.get_scheduled_post(&post.id).await.unwrap().unwrap();

        assert_eq!(fetched.channel, Channel::Instagram);
        assert_eq!(fetched.hashtags, vec!["one", "two"]);
        assert_eq!(fetched.status, ScheduleStatus::Scheduled);
        assert_eq!(fetched.version, 0);
    }

    #[tokio::test]
    async fn test_has_scheduled_only_counts_pending_entries() {
        let db = test_db().await;

        let post = ScheduledPost::new(
            "article-1".to_string(),
            "acct-1".to_string(),
            Channel::Linkedin,
            "text".to_string(),
            1_900_000_000,
        );
        db.insert_scheduled_post(&post).await.unwrap();

        assert!(db
            .has_scheduled("article-1", Channel::Linkedin)
            .await
            .unwrap());
        assert!(!db
            .has_scheduled("article-1", Channel::Facebook)
            .await
            .unwrap());

        db.mark_published(&post.id, 0, "urn:li:ugcPost:1", 1_900_000_100)
            .await
            .unwrap();

        // Published entries no longer block re-scheduling
        assert!(!db
            .has_scheduled("article-1", Channel::Linkedin)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_due_scheduled_posts_filters_by_time_and_status() {
        let db = test_db().await;

        let mut due = ScheduledPost::new(
            "article-1".to_string(),
            "acct-1".to_string(),
            Channel::Facebook,
            "due".to_string(),
            1_000,
        );
        due.id = "due".to_string();
        let mut future = ScheduledPost::new(
            "article-1".to_string(),
            "acct-1".to_string(),
            Channel::Facebook,
            "future".to_string(),
            9_999_999,
        );
        future.id = "future".to_string();

        db.insert_scheduled_post(&due).await.unwrap();
        db.insert_scheduled_post(&future).await.unwrap();

        let found = db.due_scheduled_posts(2_000).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "due");

        db.mark_failed("due", 0, "boom").await.unwrap();
        assert!(db.due_scheduled_posts(2_000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_published_sets_success_fields_only() {
        let db = test_db().await;

        let post = ScheduledPost::new(
            "article-1".to_string(),
            "acct-1".to_string(),
            Channel::Linkedin,
            "text".to_string(),
            1_000,
        );
        db.insert_scheduled_post(&post).await.unwrap();
        db.mark_published(&post.id, 0, "urn:li:ugcPost:42", 5_000)
            .await
            .unwrap();

        let fetched = db.get_scheduled_post(&post.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ScheduleStatus::Published);
        assert_eq!(fetched.platform_post_id, Some("urn:li:ugcPost:42".to_string()));
        assert_eq!(fetched.published_at, Some(5_000));
        assert_eq!(fetched.error, None);
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn test_mark_failed_sets_error_only() {
        let db = test_db().await;

        let post = ScheduledPost::new(
            "article-1".to_string(),
            "acct-1".to_string(),
            Channel::Facebook,
            "text".to_string(),
            1_000,
        );
        db.insert_scheduled_post(&post).await.unwrap();
        db.mark_failed(&post.id, 0, "facebook API error: boom")
            .await
            .unwrap();

        let fetched = db.get_scheduled_post(&post.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ScheduleStatus::Failed);
        assert_eq!(fetched.error, Some("facebook API error: boom".to_string()));
        assert_eq!(fetched.platform_post_id, None);
        assert_eq!(fetched.published_at, None);
    }

    #[tokio::test]
    async fn test_status_writes_are_one_shot() {
        let db = test_db().await;

        let post = ScheduledPost::new(
            "article-1".to_string(),
            "acct-1".to_string(),
            Channel::Linkedin,
            "text".to_string(),
            1_000,
        );
        db.insert_scheduled_post(&post).await.unwrap();
        db.mark_published(&post.id, 0, "urn:li:ugcPost:1", 2_000)
            .await
            .unwrap();

        // A duplicate trigger arrives with the stale version
        let result = db.mark_published(&post.id, 0, "urn:li:ugcPost:2", 3_000).await;
        match result {
            Err(crate::error::CrosscastError::Store(StoreError::AlreadyProcessed(msg))) => {
                assert!(msg.contains("not found or already processed"));
            }
            other => panic!("Expected AlreadyProcessed, got {:?}", other.err()),
        }

        // And a failure write cannot demote a published entry
        assert!(db.mark_failed(&post.id, 1, "late failure").await.is_err());
        let fetched = db.get_scheduled_post(&post.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ScheduleStatus::Published);
        assert_eq!(fetched.platform_post_id, Some("urn:li:ugcPost:1".to_string()));
    }

    #[tokio::test]
    async fn test_stale_version_on_pending_entry_is_conflict() {
        let db = test_db().await;

        let post = ScheduledPost::new(
            "article-1".to_string(),
            "acct-1".to_string(),
            Channel::Linkedin,
            "text".to_string(),
            1_000,
        );
        db.insert_scheduled_post(&post).await.unwrap();

        let result = db.mark_published(&post.id, 7, "urn:li:ugcPost:1", 2_000).await;
        match result {
            Err(crate::error::CrosscastError::Store(StoreError::Conflict(_))) => {}
            other => panic!("Expected Conflict, got {:?}", other.err()),
        }
    }
}
