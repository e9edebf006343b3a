//! Core types for Crosscast

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CrosscastError;

/// A publishing channel (social platform) that scheduled posts target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Linkedin,
    Facebook,
    Instagram,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Linkedin => "linkedin",
            Channel::Facebook => "facebook",
            Channel::Instagram => "instagram",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = CrosscastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linkedin" => Ok(Channel::Linkedin),
            "facebook" => Ok(Channel::Facebook),
            "instagram" => Ok(Channel::Instagram),
            _ => Err(CrosscastError::InvalidInput(format!(
                "Unknown channel: '{}'. Valid channels: linkedin, facebook, instagram",
                s
            ))),
        }
    }
}

/// A content generation target. Superset of [`Channel`]: includes long-form
/// targets that are generated and previewed but not published through the
/// scheduled-post pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentTarget {
    Newsletter,
    Linkedin,
    Facebook,
    Instagram,
    Medium,
}

impl ContentTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentTarget::Newsletter => "newsletter",
            ContentTarget::Linkedin => "linkedin",
            ContentTarget::Facebook => "facebook",
            ContentTarget::Instagram => "instagram",
            ContentTarget::Medium => "medium",
        }
    }

    /// The publishing channel behind this target, if it has one. Long-form
    /// targets (newsletter, medium) are preview-only and have none.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            ContentTarget::Linkedin => Some(Channel::Linkedin),
            ContentTarget::Facebook => Some(Channel::Facebook),
            ContentTarget::Instagram => Some(Channel::Instagram),
            ContentTarget::Newsletter | ContentTarget::Medium => None,
        }
    }
}

impl std::fmt::Display for ContentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContentTarget {
    type Err = CrosscastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newsletter" => Ok(ContentTarget::Newsletter),
            "linkedin" => Ok(ContentTarget::Linkedin),
            "facebook" => Ok(ContentTarget::Facebook),
            "instagram" => Ok(ContentTarget::Instagram),
            "medium" => Ok(ContentTarget::Medium),
            _ => Err(CrosscastError::InvalidInput(format!(
                "Unknown target: '{}'. Valid targets: newsletter, linkedin, facebook, instagram, medium",
                s
            ))),
        }
    }
}

impl From<Channel> for ContentTarget {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Linkedin => ContentTarget::Linkedin,
            Channel::Facebook => ContentTarget::Facebook,
            Channel::Instagram => ContentTarget::Instagram,
        }
    }
}

/// Status state machine for a scheduled post.
///
/// `Scheduled` is the only non-terminal state: it transitions exactly once,
/// to either `Published` or `Failed`, and never reverts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Scheduled,
    Published,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Published => "published",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "published" => ScheduleStatus::Published,
            "failed" => ScheduleStatus::Failed,
            _ => ScheduleStatus::Scheduled,
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in an article's publish schedule.
///
/// Keyed by a stable id so status updates target a single row instead of
/// rewriting a whole list. `version` is bumped on every status write; writers
/// supply the version they read so a concurrent duplicate trigger loses
/// cleanly instead of clobbering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub article_id: String,
    /// Connected account that will perform the publish.
    pub account_id: String,
    pub channel: Channel,
    /// Plain post text, or the caption for Instagram.
    pub content: String,
    pub image_url: Option<String>,
    /// Ordered hashtags, Instagram only. Empty for other channels.
    pub hashtags: Vec<String>,
    pub scheduled_at: i64,
    pub status: ScheduleStatus,
    /// Set only on success, together with `published_at`.
    pub platform_post_id: Option<String>,
    /// Set only on failure.
    pub error: Option<String>,
    pub published_at: Option<i64>,
    pub version: i64,
}

impl ScheduledPost {
    pub fn new(
        article_id: String,
        account_id: String,
        channel: Channel,
        content: String,
        scheduled_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            article_id,
            account_id,
            channel,
            content,
            image_url: None,
            hashtags: Vec::new(),
            scheduled_at,
            status: ScheduleStatus::Scheduled,
            platform_post_id: None,
            error: None,
            published_at: None,
            version: 0,
        }
    }
}

/// A connected social account with its OAuth credential.
///
/// For Facebook and Instagram `access_token` is the derived page token
/// (treated as non-expiring once the backing user token is long-lived) and
/// `user_access_token` is the long-lived user token that gets refreshed.
/// For LinkedIn `access_token` is the member token and `refresh_token`
/// drives the refresh grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: String,
    pub platform: Channel,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_access_token: Option<String>,
    pub page_id: Option<String>,
    pub profile_id: Option<String>,
    pub ig_business_account_id: Option<String>,
    pub expires_at: i64,
    pub connected_at: i64,
}

/// The subset of an article document the distribution engine reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: String,
    pub body: String,
    pub main_image_url: Option<String>,
}

/// A persisted generation preview for one (article, target) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preview {
    pub article_id: String,
    pub target: ContentTarget,
    pub content: crate::generation::GeneratedContent,
    pub generated_at: i64,
}
