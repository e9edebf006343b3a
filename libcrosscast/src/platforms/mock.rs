//! Mock publisher for testing
//!
//! A configurable publisher that can simulate successes, failures, and
//! slow platforms. Compiled into the library so integration tests can
//! exercise the orchestrator and job runner without network access or
//! platform credentials.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::types::{Channel, SocialAccount};

use super::{PlatformPublisher, PublishReceipt, PublishRequest};

#[derive(Clone)]
pub struct MockConfig {
    pub channel: Channel,
    /// Whether publish should succeed.
    pub publish_succeeds: bool,
    /// Error message returned on publish failure.
    pub publish_error: Option<String>,
    /// Delay before completing a publish (simulates network latency).
    pub delay: Duration,
    pub character_limit: usize,
    /// Whether the mock requires an image, like the real Instagram.
    pub require_image: bool,
    /// Number of times publish has been called.
    pub publish_call_count: Arc<Mutex<usize>>,
    /// Requests that were published (for verification).
    pub published: Arc<Mutex<Vec<PublishRequest>>>,
}

impl MockConfig {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            publish_succeeds: true,
            publish_error: None,
            delay: Duration::from_millis(0),
            character_limit: 10_000,
            require_image: false,
            publish_call_count: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub struct MockPublisher {
    config: MockConfig,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A mock that always succeeds.
    pub fn success(channel: Channel) -> Self {
        Self::new(MockConfig::new(channel))
    }

    /// A mock whose publish fails with the given error message.
    pub fn failure(channel: Channel, error: &str) -> Self {
        let mut config = MockConfig::new(channel);
        config.publish_succeeds = false;
        config.publish_error = Some(error.to_string());
        Self::new(config)
    }

    /// A mock with a character limit.
    pub fn with_limit(channel: Channel, limit: usize) -> Self {
        let mut config = MockConfig::new(channel);
        config.character_limit = limit;
        Self::new(config)
    }

    /// A mock that rejects requests without an image, like Instagram.
    pub fn requiring_image(channel: Channel) -> Self {
        let mut config = MockConfig::new(channel);
        config.require_image = true;
        Self::new(config)
    }

    /// A mock with a publish delay.
    pub fn with_delay(channel: Channel, delay: Duration) -> Self {
        let mut config = MockConfig::new(channel);
        config.delay = delay;
        Self::new(config)
    }

    pub fn publish_call_count(&self) -> usize {
        *self.config.publish_call_count.lock().unwrap()
    }

    pub fn published(&self) -> Vec<PublishRequest> {
        self.config.published.lock().unwrap().clone()
    }

    /// Handles to the shared counters, so a test can keep observing after
    /// the publisher has been moved into a registry.
    pub fn counters(&self) -> (Arc<Mutex<usize>>, Arc<Mutex<Vec<PublishRequest>>>) {
        (
            self.config.publish_call_count.clone(),
            self.config.published.clone(),
        )
    }
}

#[async_trait]
impl PlatformPublisher for MockPublisher {
    fn channel(&self) -> Channel {
        self.config.channel
    }

    fn character_limit(&self) -> usize {
        self.config.character_limit
    }

    fn validate_request(&self, request: &PublishRequest) -> Result<()> {
        if self.config.require_image && request.image_url.is_none() {
            return Err(
                PlatformError::Validation("imageUrl is required for Instagram".to_string()).into(),
            );
        }
        if request.text.trim().is_empty() {
            return Err(PlatformError::Validation("Post text is required".to_string()).into());
        }
        if request.text.chars().count() > self.config.character_limit {
            return Err(PlatformError::Validation(format!(
                "Content too long: limit is {}",
                self.config.character_limit
            ))
            .into());
        }
        Ok(())
    }

    async fn publish(
        &self,
        _account: &SocialAccount,
        _token: &str,
        request: &PublishRequest,
    ) -> Result<PublishReceipt> {
        *self.config.publish_call_count.lock().unwrap() += 1;

        self.validate_request(request)?;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if self.config.publish_succeeds {
            self.config.published.lock().unwrap().push(request.clone());
            Ok(PublishReceipt {
                id: format!("{}:mock-{}", self.config.channel, uuid::Uuid::new_v4()),
                activity: None,
            })
        } else {
            let message = self
                .config
                .publish_error
                .clone()
                .unwrap_or_else(|| "Mock publish failed".to_string());
            Err(PlatformError::Api {
                platform: self.config.channel.to_string(),
                message,
            }
            .into())
        }
    }
}
