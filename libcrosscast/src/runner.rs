//! Scheduled-post job runner
//!
//! Drives one due scheduled post through its terminal transition:
//! scheduled to published on publisher success, scheduled to failed on any
//! publish or credential error. Both transitions are terminal; nothing is
//! retried or re-enqueued here.
//!
//! The guard path is different from the failure path: a post that is
//! missing or no longer in `scheduled` status means a duplicate trigger,
//! and the runner must neither call a publisher nor write anything.

use tracing::{info, warn};

use crate::credentials::CredentialStore;
use crate::db::Database;
use crate::error::{CrosscastError, Result, StoreError};
use crate::platforms::{PublishRequest, PublisherRegistry};
use crate::types::{Channel, ScheduledPost};

/// Result of one runner invocation. Publish failures are recorded in the
/// post's row and reported here with `success = false`; they are data, not
/// errors.
#[derive(Debug)]
pub struct JobOutcome {
    pub scheduled_post_id: String,
    pub channel: Option<Channel>,
    pub success: bool,
    pub platform_post_id: Option<String>,
    pub error: Option<String>,
}

pub struct ScheduledJobRunner {
    db: Database,
    credentials: CredentialStore,
    registry: PublisherRegistry,
}

impl ScheduledJobRunner {
    pub fn new(db: Database, credentials: CredentialStore, registry: PublisherRegistry) -> Self {
        Self {
            db,
            credentials,
            registry,
        }
    }

    /// Run one scheduled post to a terminal state.
    pub async fn run(&self, scheduled_post_id: &str) -> JobOutcome {
        let post = match self.load_pending(scheduled_post_id).await {
            Ok(post) => post,
            Err(e) => {
                // Duplicate trigger or store failure: no publisher call,
                // no status write
                return JobOutcome {
                    scheduled_post_id: scheduled_post_id.to_string(),
                    channel: None,
                    success: false,
                    platform_post_id: None,
                    error: Some(e.to_string()),
                };
            }
        };

        match self.publish(&post).await {
            Ok(platform_post_id) => {
                let published_at = chrono::Utc::now().timestamp();
                if let Err(e) = self
                    .db
                    .mark_published(&post.id, post.version, &platform_post_id, published_at)
                    .await
                {
                    // A concurrent trigger won the write; report without
                    // overwriting its result
                    warn!(scheduled_post_id = %post.id, error = %e, "Publish succeeded but status write lost");
                    return JobOutcome {
                        scheduled_post_id: post.id,
                        channel: Some(post.channel),
                        success: false,
                        platform_post_id: Some(platform_post_id),
                        error: Some(e.to_string()),
                    };
                }

                info!(
                    scheduled_post_id = %post.id,
                    channel = %post.channel,
                    %platform_post_id,
                    "Scheduled post published"
                );
                JobOutcome {
                    scheduled_post_id: post.id,
                    channel: Some(post.channel),
                    success: true,
                    platform_post_id: Some(platform_post_id),
                    error: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(
                    scheduled_post_id = %post.id,
                    channel = %post.channel,
                    error = %message,
                    "Scheduled post failed to publish"
                );
                if let Err(write_err) =
                    self.db.mark_failed(&post.id, post.version, &message).await
                {
                    warn!(scheduled_post_id = %post.id, error = %write_err, "Failure status write lost");
                }
                JobOutcome {
                    scheduled_post_id: post.id,
                    channel: Some(post.channel),
                    success: false,
                    platform_post_id: None,
                    error: Some(message),
                }
            }
        }
    }

    /// Run every post that is due at `now`, in schedule order.
    pub async fn run_due(&self, now: i64) -> Result<Vec<JobOutcome>> {
        let due = self.db.due_scheduled_posts(now).await?;
        let mut outcomes = Vec::with_capacity(due.len());
        for post in due {
            outcomes.push(self.run(&post.id).await);
        }
        Ok(outcomes)
    }

    async fn load_pending(&self, scheduled_post_id: &str) -> Result<ScheduledPost> {
        match self.db.get_scheduled_post(scheduled_post_id).await? {
            Some(post) if post.status == crate::types::ScheduleStatus::Scheduled => Ok(post),
            _ => Err(StoreError::AlreadyProcessed(
                "Scheduled post not found or already processed".to_string(),
            )
            .into()),
        }
    }

    async fn publish(&self, post: &ScheduledPost) -> std::result::Result<String, CrosscastError> {
        let publisher = self.registry.resolve(post.channel)?;

        let account = self
            .db
            .get_social_account(&post.account_id)
            .await?
            .ok_or_else(|| {
                crate::error::CredentialError::NotConnected(post.channel.to_string())
            })?;
        let token = self.credentials.valid_access_token(&account).await?;

        let request = PublishRequest {
            text: post.content.clone(),
            image_url: post.image_url.clone(),
            hashtags: post.hashtags.clone(),
        };
        publisher.validate_request(&request)?;

        let receipt = publisher.publish(&account, &token, &request).await?;
        Ok(receipt.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::MockPublisher;
    use crate::types::{ScheduleStatus, SocialAccount};
    use std::sync::Arc;

    fn account(channel: Channel) -> SocialAccount {
        SocialAccount {
            id: format!("acct-{}", channel),
            platform: channel,
            access_token: "token".to_string(),
            refresh_token: None,
            user_access_token: None,
            page_id: None,
            profile_id: None,
            ig_business_account_id: None,
            expires_at: chrono::Utc::now().timestamp() + 86_400,
            connected_at: 0,
        }
    }

    async fn setup(publisher: MockPublisher) -> (ScheduledJobRunner, Database) {
        let db = Database::new(":memory:").await.unwrap();
        let credentials = CredentialStore::new(db.clone(), None, None);
        let mut registry = PublisherRegistry::new();
        registry.register(Arc::new(publisher));
        (
            ScheduledJobRunner::new(db.clone(), credentials, registry),
            db,
        )
    }

    async fn insert_post(db: &Database, channel: Channel) -> ScheduledPost {
        db.upsert_social_account(&account(channel)).await.unwrap();
        let post = ScheduledPost::new(
            "article-1".to_string(),
            format!("acct-{}", channel),
            channel,
            "Post text".to_string(),
            1_000,
        );
        db.insert_scheduled_post(&post).await.unwrap();
        post
    }

    #[tokio::test]
    async fn test_successful_run_transitions_to_published() {
        let (runner, db) = setup(MockPublisher::success(Channel::Linkedin)).await;
        let post = insert_post(&db, Channel::Linkedin).await;

        let outcome = runner.run(&post.id).await;
        assert!(outcome.success);
        assert!(outcome.platform_post_id.is_some());

        let stored = db.get_scheduled_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Published);
        assert!(stored.published_at.is_some());
        assert_eq!(stored.error, None);
    }

    #[tokio::test]
    async fn test_publish_failure_recorded_as_data() {
        let (runner, db) = setup(MockPublisher::failure(
            Channel::Facebook,
            "(#200) permission denied",
        ))
        .await;
        let post = insert_post(&db, Channel::Facebook).await;

        let outcome = runner.run(&post.id).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("permission denied"));

        let stored = db.get_scheduled_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Failed);
        assert!(stored.error.unwrap().contains("permission denied"));
        assert_eq!(stored.platform_post_id, None);
    }

    #[tokio::test]
    async fn test_double_trigger_guard() {
        let publisher = MockPublisher::success(Channel::Linkedin);
        let (calls, _) = publisher.counters();
        let (runner, db) = setup(publisher).await;
        let post = insert_post(&db, Channel::Linkedin).await;

        assert!(runner.run(&post.id).await.success);
        assert_eq!(*calls.lock().unwrap(), 1);

        // Second trigger for an already-published entry: no publisher call,
        // no status change
        let second = runner.run(&post.id).await;
        assert!(!second.success);
        assert!(second
            .error
            .unwrap()
            .contains("not found or already processed"));
        assert_eq!(*calls.lock().unwrap(), 1);

        let stored = db.get_scheduled_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Published);
    }

    #[tokio::test]
    async fn test_unknown_post_id_is_guard_error() {
        let (runner, _db) = setup(MockPublisher::success(Channel::Linkedin)).await;
        let outcome = runner.run("nope").await;
        assert!(!outcome.success);
        assert!(outcome
            .error
            .unwrap()
            .contains("not found or already processed"));
    }

    #[tokio::test]
    async fn test_unregistered_channel_fails_the_post() {
        // Registry only knows LinkedIn; the post targets Facebook
        let (runner, db) = setup(MockPublisher::success(Channel::Linkedin)).await;
        let post = insert_post(&db, Channel::Facebook).await;

        let outcome = runner.run(&post.id).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not yet implemented"));

        let stored = db.get_scheduled_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_account_fails_the_post() {
        let (runner, db) = setup(MockPublisher::success(Channel::Linkedin)).await;
        let post = ScheduledPost::new(
            "article-1".to_string(),
            "acct-deleted".to_string(),
            Channel::Linkedin,
            "Post text".to_string(),
            1_000,
        );
        db.insert_scheduled_post(&post).await.unwrap();

        let outcome = runner.run(&post.id).await;
        assert!(!outcome.success);

        let stored = db.get_scheduled_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Failed);
        assert!(stored.error.unwrap().contains("No linkedin account"));
    }

    #[tokio::test]
    async fn test_run_due_processes_in_schedule_order() {
        let (runner, db) = setup(MockPublisher::success(Channel::Linkedin)).await;
        db.upsert_social_account(&account(Channel::Linkedin))
            .await
            .unwrap();

        let mut late = ScheduledPost::new(
            "article-1".to_string(),
            "acct-linkedin".to_string(),
            Channel::Linkedin,
            "late".to_string(),
            2_000,
        );
        late.id = "late".to_string();
        let mut early = ScheduledPost::new(
            "article-1".to_string(),
            "acct-linkedin".to_string(),
            Channel::Linkedin,
            "early".to_string(),
            1_000,
        );
        early.id = "early".to_string();
        db.insert_scheduled_post(&late).await.unwrap();
        db.insert_scheduled_post(&early).await.unwrap();

        let outcomes = runner.run_due(5_000).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].scheduled_post_id, "early");
        assert_eq!(outcomes[1].scheduled_post_id, "late");
        assert!(outcomes.iter().all(|o| o.success));

        // Nothing left due
        assert!(runner.run_due(5_000).await.unwrap().is_empty());
    }
}
