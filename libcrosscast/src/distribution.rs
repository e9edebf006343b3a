//! Distribution orchestration
//!
//! Coordinates generation, preview persistence, and optional scheduling for
//! one article across the requested content targets. Generation is
//! all-or-nothing: one target failing aborts the whole run and surfaces that
//! target's error. The orchestrator never returns `Err`; every failure path
//! resolves to an outcome with `success = false`.

use tracing::{info, warn};

use crate::config::SiteConfig;
use crate::db::Database;
use crate::error::{CredentialError, CrosscastError, Result, StoreError};
use crate::generation::{ContentGenerator, GenerateOptions, GeneratedContent};
use crate::types::{Article, Channel, ContentTarget, Preview, ScheduledPost};

/// One distribution run: which article, which content targets, and whether
/// to schedule the results. Channel targets can be scheduled; long-form
/// targets (newsletter, medium) generate previews only.
#[derive(Debug, Clone)]
pub struct DistributionRequest {
    pub article_id: String,
    pub targets: Vec<ContentTarget>,
    /// When set, a ScheduledPost is created per channel target at this
    /// instant.
    pub publish_at: Option<i64>,
    /// Skip the already-scheduled idempotency check.
    pub force: bool,
}

#[derive(Debug)]
pub struct DistributionOutcome {
    pub success: bool,
    pub scheduled_post_ids: Vec<String>,
    pub previews: Vec<Preview>,
    pub error: Option<CrosscastError>,
}

impl DistributionOutcome {
    fn failure(error: CrosscastError) -> Self {
        Self {
            success: false,
            scheduled_post_ids: Vec::new(),
            previews: Vec::new(),
            error: Some(error),
        }
    }

    /// Process exit code for this outcome. Keeps the error category
    /// (credential, rate limit, invalid input) visible to callers even
    /// though the error itself is data here, not a raised `Err`.
    pub fn exit_code(&self) -> i32 {
        self.error.as_ref().map_or(0, CrosscastError::exit_code)
    }
}

pub struct DistributionOrchestrator {
    db: Database,
    generator: ContentGenerator,
    site: SiteConfig,
}

impl DistributionOrchestrator {
    pub fn new(db: Database, generator: ContentGenerator, site: SiteConfig) -> Self {
        Self {
            db,
            generator,
            site,
        }
    }

    /// Run a distribution. All failures land in the outcome; this never
    /// returns an error to the caller.
    pub async fn run_distribution(&self, request: &DistributionRequest) -> DistributionOutcome {
        match self.execute(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(article_id = %request.article_id, error = %e, "Distribution failed");
                DistributionOutcome::failure(e)
            }
        }
    }

    async fn execute(&self, request: &DistributionRequest) -> Result<DistributionOutcome> {
        if !request.force {
            for target in &request.targets {
                let Some(channel) = target.channel() else {
                    continue;
                };
                if self.db.has_scheduled(&request.article_id, channel).await? {
                    return Err(StoreError::AlreadyScheduled(format!(
                        "{} is already scheduled for this article; use force to regenerate",
                        channel
                    ))
                    .into());
                }
            }
        }

        let article = self
            .db
            .get_article(&request.article_id)
            .await?
            .ok_or_else(|| {
                StoreError::NotFound(format!("Article not found: {}", request.article_id))
            })?;

        let slug = article.slug.as_deref().ok_or_else(|| {
            CrosscastError::InvalidInput(format!(
                "Article {} has no slug; cannot build a canonical URL",
                article.id
            ))
        })?;
        let canonical_url = self.site.canonical_url(slug);

        let options = GenerateOptions {
            article_id: article.id.clone(),
            title: article.title.clone(),
            excerpt: article.excerpt.clone(),
            body: article.body.clone(),
            canonical_url: Some(canonical_url),
        };

        // All-or-nothing: the first failing target aborts the run
        let mut generated: Vec<(ContentTarget, GeneratedContent)> = Vec::new();
        for target in &request.targets {
            let content = self.generator.generate(*target, &options).await?;
            generated.push((*target, content));
        }

        let now = chrono::Utc::now().timestamp();
        let mut previews = Vec::new();
        for (_, content) in &generated {
            let preview = Preview {
                article_id: article.id.clone(),
                target: content.target(),
                content: content.clone(),
                generated_at: now,
            };
            self.db.save_preview(&preview).await?;
            previews.push(preview);
        }

        let mut scheduled_post_ids = Vec::new();
        if let Some(publish_at) = request.publish_at {
            for (target, content) in &generated {
                let Some(channel) = target.channel() else {
                    continue;
                };
                let Some(text) = content.post_text().filter(|t| !t.trim().is_empty()) else {
                    continue;
                };
                let post = self
                    .build_scheduled_post(channel, &article, text, content, publish_at)
                    .await?;
                self.db.insert_scheduled_post(&post).await?;
                info!(
                    scheduled_post_id = %post.id,
                    channel = %channel,
                    publish_at,
                    "Scheduled post created"
                );
                scheduled_post_ids.push(post.id);
            }
        }

        Ok(DistributionOutcome {
            success: true,
            scheduled_post_ids,
            previews,
            error: None,
        })
    }

    /// Scheduling needs a connected account up front, so a missing account
    /// fails the run instead of producing a post that can never publish.
    async fn build_scheduled_post(
        &self,
        channel: Channel,
        article: &Article,
        text: &str,
        content: &GeneratedContent,
        publish_at: i64,
    ) -> Result<ScheduledPost> {
        let account = self
            .db
            .account_for_channel(channel)
            .await?
            .ok_or_else(|| CredentialError::NotConnected(channel.to_string()))?;

        let mut post = ScheduledPost::new(
            article.id.clone(),
            account.id,
            channel,
            text.to_string(),
            publish_at,
        );
        post.image_url = article.main_image_url.clone();
        post.hashtags = content.hashtags().to_vec();
        Ok(post)
    }
}
