//! AI-assisted content generation
//!
//! One call per (target, article) pair: rate-limit gate, target-specific
//! prompt, model call, fenced-JSON parse, safety-net truncation, schema
//! validation, and the canonical-URL append for LinkedIn and Facebook.
//! Parse failures are fatal and never retried automatically.

pub mod prompts;
pub mod provider;
pub mod schema;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{GenerationError, Result};
use crate::rate_limiter::{RateLimitStatus, RateLimiter};
use crate::types::ContentTarget;

pub use provider::{CannedModel, LanguageModel, OpenAiCompatibleModel};

/// Inputs to a generation call, extracted from the article.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub article_id: String,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    /// Public URL of the article. Appended to LinkedIn/Facebook posts and
    /// embedded in the Medium prompt.
    pub canonical_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsletterContent {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocialPostContent {
    pub post: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstagramContent {
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediumContent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub body: String,
    pub tags: Vec<String>,
    pub canonical_url: String,
}

/// Validated generation output for one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "target", rename_all = "lowercase")]
pub enum GeneratedContent {
    Newsletter(NewsletterContent),
    Linkedin(SocialPostContent),
    Facebook(SocialPostContent),
    Instagram(InstagramContent),
    Medium(MediumContent),
}

impl GeneratedContent {
    pub fn target(&self) -> ContentTarget {
        match self {
            GeneratedContent::Newsletter(_) => ContentTarget::Newsletter,
            GeneratedContent::Linkedin(_) => ContentTarget::Linkedin,
            GeneratedContent::Facebook(_) => ContentTarget::Facebook,
            GeneratedContent::Instagram(_) => ContentTarget::Instagram,
            GeneratedContent::Medium(_) => ContentTarget::Medium,
        }
    }

    /// The text a scheduled post carries: the post body for LinkedIn and
    /// Facebook, the caption for Instagram. Long-form targets have no
    /// scheduled-post representation.
    pub fn post_text(&self) -> Option<&str> {
        match self {
            GeneratedContent::Linkedin(c) | GeneratedContent::Facebook(c) => Some(&c.post),
            GeneratedContent::Instagram(c) => Some(&c.caption),
            _ => None,
        }
    }

    /// Instagram hashtags, empty for every other target.
    pub fn hashtags(&self) -> &[String] {
        match self {
            GeneratedContent::Instagram(c) => &c.hashtags,
            _ => &[],
        }
    }
}

pub struct ContentGenerator {
    model: Arc<dyn LanguageModel>,
    limiter: RateLimiter,
}

impl ContentGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, limiter: RateLimiter) -> Self {
        Self { model, limiter }
    }

    /// Generate validated content for one target.
    pub async fn generate(
        &self,
        target: ContentTarget,
        options: &GenerateOptions,
    ) -> Result<GeneratedContent> {
        let key = rate_limit_key(target, &options.article_id);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let status = self.limiter.check_and_consume(&key, now_ms);
        if !status.allowed {
            return Err(GenerationError::RateLimited {
                content_type: target.to_string(),
                remaining_ms: status.remaining_ms.unwrap_or(self.limiter.window_ms()),
            }
            .into());
        }

        debug!(%target, article_id = %options.article_id, "Generating content");

        let prompt = prompts::build_prompt(target, options);
        let raw = self.model.generate_text(&prompt).await?;

        let mut content = schema::parse_generated(target, &raw)?;
        schema::enforce_limits(&mut content);
        schema::validate(&content)?;

        if let Some(url) = options.canonical_url.as_deref() {
            match &mut content {
                GeneratedContent::Linkedin(c) | GeneratedContent::Facebook(c) => {
                    c.post = schema::append_canonical_url(&c.post, url);
                }
                _ => {}
            }
        }

        info!(%target, article_id = %options.article_id, "Content generated");
        Ok(content)
    }

    /// Rate-limit countdown for UI polling. Never consumes the window.
    pub fn rate_limit_status(&self, target: ContentTarget, article_id: &str) -> RateLimitStatus {
        let key = rate_limit_key(target, article_id);
        self.limiter
            .peek_status(&key, chrono::Utc::now().timestamp_millis())
    }
}

fn rate_limit_key(target: ContentTarget, article_id: &str) -> String {
    format!("{}:{}", target, article_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrosscastError;
    use crate::rate_limiter::RateLimiter;

    fn options() -> GenerateOptions {
        GenerateOptions {
            article_id: "article-1".to_string(),
            title: "Title".to_string(),
            excerpt: "Excerpt".to_string(),
            body: "Body".to_string(),
            canonical_url: Some("https://blog.example.com/title".to_string()),
        }
    }

    fn generator(responses: Vec<&str>) -> ContentGenerator {
        ContentGenerator::new(Arc::new(CannedModel::new(responses)), RateLimiter::in_memory())
    }

    #[tokio::test]
    async fn test_generate_linkedin_appends_canonical_url_once() {
        let generator = generator(vec![r#"{"post": "A fine post."}"#]);
        let content = generator
            .generate(ContentTarget::Linkedin, &options())
            .await
            .unwrap();

        let text = content.post_text().unwrap();
        assert_eq!(
            text.matches("https://blog.example.com/title").count(),
            1
        );
        assert!(text.starts_with("A fine post."));
    }

    #[tokio::test]
    async fn test_generate_does_not_duplicate_existing_url() {
        let generator = generator(vec![
            r#"{"post": "See https://blog.example.com/title for details."}"#,
        ]);
        let content = generator
            .generate(ContentTarget::Facebook, &options())
            .await
            .unwrap();

        assert_eq!(
            content
                .post_text()
                .unwrap()
                .matches("https://blog.example.com/title")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_second_generate_is_rate_limited() {
        let generator = generator(vec![
            r#"{"post": "first"}"#,
            r#"{"post": "second"}"#,
        ]);

        generator
            .generate(ContentTarget::Linkedin, &options())
            .await
            .unwrap();

        let result = generator.generate(ContentTarget::Linkedin, &options()).await;
        match result {
            Err(CrosscastError::Generation(GenerationError::RateLimited {
                content_type,
                remaining_ms,
            })) => {
                assert_eq!(content_type, "linkedin");
                assert!(remaining_ms > 0);
            }
            other => panic!("Expected RateLimited, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_different_targets_not_cross_limited() {
        let generator = generator(vec![
            r#"{"post": "linkedin"}"#,
            r#"{"post": "facebook"}"#,
        ]);

        generator
            .generate(ContentTarget::Linkedin, &options())
            .await
            .unwrap();
        generator
            .generate(ContentTarget::Facebook, &options())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_status_does_not_consume() {
        let generator = generator(vec![r#"{"post": "only"}"#]);

        for _ in 0..3 {
            assert!(
                generator
                    .rate_limit_status(ContentTarget::Linkedin, "article-1")
                    .allowed
            );
        }

        generator
            .generate(ContentTarget::Linkedin, &options())
            .await
            .unwrap();
        assert!(
            !generator
                .rate_limit_status(ContentTarget::Linkedin, "article-1")
                .allowed
        );
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_fatal_without_retry() {
        let model = Arc::new(CannedModel::new(vec!["not json", r#"{"post": "x"}"#]));
        let generator = ContentGenerator::new(model.clone(), RateLimiter::in_memory());

        let result = generator.generate(ContentTarget::Linkedin, &options()).await;
        assert!(matches!(
            result,
            Err(CrosscastError::Generation(GenerationError::Parse(_)))
        ));
        // No automatic retry: the second canned reply was never requested
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_overlong_reply_truncated_then_valid() {
        let long_post = format!("Sentence one. {}", "More words here. ".repeat(60));
        let reply = serde_json::to_string(&serde_json::json!({ "post": long_post })).unwrap();
        let generator = generator(vec![&reply]);

        let content = generator
            .generate(ContentTarget::Facebook, &options())
            .await
            .unwrap();

        // Truncated under the Facebook cap (plus the appended URL), ending
        // at a sentence boundary
        let text = content.post_text().unwrap();
        let body = text
            .strip_suffix("\n\nhttps://blog.example.com/title")
            .unwrap();
        assert!(body.chars().count() <= schema::FACEBOOK_POST_MAX);
        assert!(body.ends_with('.'));
    }

    #[test]
    fn test_generated_content_serde_round_trip() {
        let content = GeneratedContent::Instagram(InstagramContent {
            caption: "caption".to_string(),
            hashtags: vec!["a".to_string(), "b".to_string()],
        });
        let json = serde_json::to_string(&content).unwrap();
        assert!(json.contains(r#""target":"instagram""#));

        let back: GeneratedContent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, content);
    }
}
