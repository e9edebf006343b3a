//! Crosscast - multi-platform social distribution for a blog
//!
//! This library generates AI-assisted marketing copy from an article and
//! publishes or schedules it to LinkedIn, Facebook, and Instagram, with
//! OAuth credential lifecycle management and a durable scheduled-post
//! state machine.

pub mod config;
pub mod credentials;
pub mod db;
pub mod distribution;
pub mod error;
pub mod generation;
pub mod logging;
pub mod platforms;
pub mod rate_limiter;
pub mod runner;
pub mod scheduling;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use credentials::CredentialStore;
pub use db::Database;
pub use distribution::{DistributionOrchestrator, DistributionOutcome, DistributionRequest};
pub use error::{CrosscastError, Result};
pub use generation::{ContentGenerator, GeneratedContent};
pub use platforms::{PlatformPublisher, PublishReceipt, PublishRequest, PublisherRegistry};
pub use rate_limiter::RateLimiter;
pub use runner::{JobOutcome, ScheduledJobRunner};
pub use types::{Article, Channel, ContentTarget, ScheduleStatus, ScheduledPost, SocialAccount};
