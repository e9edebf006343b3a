//! Platform publishers
//!
//! One trait, one implementation per social platform. Each publisher takes
//! a valid access token and a publish request and drives the platform's
//! wire protocol to completion. Any non-2xx response at any step aborts
//! the remaining steps; nothing here retries.
//!
//! Publishers are selected through [`PublisherRegistry`], so adding a
//! platform means adding one implementation and one `register` call.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PlatformError, Result};
use crate::types::{Channel, SocialAccount};

pub mod facebook;
pub mod instagram;
pub mod linkedin;

// Mock publisher is available for all builds (not just tests) to support
// integration tests
pub mod mock;

pub use facebook::FacebookPublisher;
pub use instagram::InstagramPublisher;
pub use linkedin::LinkedinPublisher;
pub use mock::MockPublisher;

/// What to publish: plain text (the caption for Instagram), an optional
/// image, and ordered hashtags (Instagram only).
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub text: String,
    pub image_url: Option<String>,
    pub hashtags: Vec<String>,
}

/// The platform's acknowledgement of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Platform-assigned post id, opaque.
    pub id: String,
    /// Secondary identifier when the platform returns one (LinkedIn's
    /// activity URN).
    pub activity: Option<String>,
}

#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    /// The channel this publisher serves.
    fn channel(&self) -> Channel;

    /// Hard character limit for the post text (full caption for Instagram).
    fn character_limit(&self) -> usize;

    /// Validate a request before any network call is made.
    fn validate_request(&self, request: &PublishRequest) -> Result<()>;

    /// Execute the platform protocol. `token` must already be valid; token
    /// lifecycle is the credential store's job, not the publisher's.
    async fn publish(
        &self,
        account: &SocialAccount,
        token: &str,
        request: &PublishRequest,
    ) -> Result<PublishReceipt>;
}

/// Lookup table from channel to publisher.
#[derive(Clone, Default)]
pub struct PublisherRegistry {
    publishers: HashMap<Channel, Arc<dyn PlatformPublisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three real publishers.
    pub fn with_defaults(linkedin_api_base: &str, graph_base: &str) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LinkedinPublisher::new(linkedin_api_base)));
        registry.register(Arc::new(FacebookPublisher::new(graph_base)));
        registry.register(Arc::new(InstagramPublisher::new(graph_base)));
        registry
    }

    pub fn register(&mut self, publisher: Arc<dyn PlatformPublisher>) {
        self.publishers.insert(publisher.channel(), publisher);
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn PlatformPublisher>> {
        self.publishers.get(&channel).cloned()
    }

    /// Resolve a publisher, failing with the job runner's "channel not yet
    /// implemented" error when none is registered.
    pub fn resolve(&self, channel: Channel) -> Result<Arc<dyn PlatformPublisher>> {
        self.get(channel).ok_or_else(|| {
            PlatformError::NotImplemented(format!("Channel not yet implemented: {}", channel))
                .into()
        })
    }
}

/// Fetch image bytes from their origin, enforcing the platform's size cap.
pub(crate) async fn fetch_image_bytes(
    client: &reqwest::Client,
    url: &str,
    max_bytes: usize,
    platform: &str,
) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PlatformError::Network(format!("Failed to fetch image {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(PlatformError::Api {
            platform: platform.to_string(),
            message: format!("Image fetch failed with status {}: {}", response.status(), url),
        }
        .into());
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PlatformError::Network(format!("Failed to read image bytes: {}", e)))?;

    if bytes.len() > max_bytes {
        return Err(PlatformError::Validation(format!(
            "Image is {} bytes, maximum for {} is {}",
            bytes.len(),
            platform,
            max_bytes
        ))
        .into());
    }

    Ok(bytes.to_vec())
}

/// Extract the platform's own error message from a Graph-style error body,
/// falling back to the raw body.
pub(crate) fn graph_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}
