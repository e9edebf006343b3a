//! Instagram publisher (via the Facebook Graph API)
//!
//! Instagram publishing is a three-phase protocol: create a media container
//! referencing the image URL, poll the container until Instagram finishes
//! ingesting it, then publish the container. This is the only asynchronous
//! wait in the whole engine: a fixed 2-second interval, at most 10 status
//! checks, roughly 20 seconds worst case.
//!
//! Instagram has no text-only posts, so a missing image is rejected before
//! any network call.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{PlatformError, Result};
use crate::types::{Channel, SocialAccount};

use super::{graph_error_message, PlatformPublisher, PublishReceipt, PublishRequest};

/// Instagram's caption limit, applied to caption plus hashtags.
pub const CAPTION_MAX: usize = 2_200;
/// Container status polling: attempts and fixed interval.
pub const POLL_ATTEMPTS: u32 = 10;
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct InstagramPublisher {
    graph_base: String,
    http: reqwest::Client,
}

impl InstagramPublisher {
    pub fn new(graph_base: &str) -> Self {
        Self {
            graph_base: graph_base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Resolve the Instagram Business Account behind the Facebook page. A
    /// page with no linked Instagram account is a configuration error, not
    /// a transient fault.
    async fn resolve_business_account(
        &self,
        account: &SocialAccount,
        token: &str,
    ) -> Result<String> {
        if let Some(ig_id) = &account.ig_business_account_id {
            return Ok(ig_id.clone());
        }

        let page_id = account.page_id.as_deref().ok_or_else(|| {
            PlatformError::Validation("Instagram account has no Facebook page id".to_string())
        })?;

        let url = format!("{}/{}", self.graph_base, page_id);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("fields", "instagram_business_account{id}"),
                ("access_token", token),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        body["instagram_business_account"]["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| {
                PlatformError::Api {
                    platform: "instagram".to_string(),
                    message: "No Instagram Business Account is linked to this Facebook Page"
                        .to_string(),
                }
                .into()
            })
    }

    async fn create_container(
        &self,
        ig_user_id: &str,
        token: &str,
        image_url: &str,
        caption: &str,
    ) -> Result<(String, Option<String>)> {
        let url = format!("{}/{}/media", self.graph_base, ig_user_id);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("image_url", image_url),
                ("caption", caption),
                ("access_token", token),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let container_id = body["id"].as_str().ok_or_else(|| PlatformError::Api {
            platform: "instagram".to_string(),
            message: "Media container response missing id".to_string(),
        })?;

        Ok((
            container_id.to_string(),
            body["status_code"].as_str().map(String::from),
        ))
    }

    async fn container_status(&self, container_id: &str, token: &str) -> Result<String> {
        let url = format!("{}/{}", self.graph_base, container_id);
        let response = self
            .http
            .get(&url)
            .query(&[("fields", "status_code"), ("access_token", token)])
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Ok(body["status_code"].as_str().unwrap_or("").to_string())
    }

    async fn publish_container(&self, ig_user_id: &str, token: &str, container_id: &str) -> Result<String> {
        let url = format!("{}/{}/media_publish", self.graph_base, ig_user_id);
        let response = self
            .http
            .post(&url)
            .form(&[("creation_id", container_id), ("access_token", token)])
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        body["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| {
                PlatformError::Api {
                    platform: "instagram".to_string(),
                    message: "media_publish response missing id".to_string(),
                }
                .into()
            })
    }
}

/// Assemble the full caption: the caption text, then a blank line and the
/// space-joined `#hashtags` when any exist.
pub fn build_full_caption(caption: &str, hashtags: &[String]) -> String {
    if hashtags.is_empty() {
        caption.to_string()
    } else {
        let tags: Vec<String> = hashtags
            .iter()
            .map(|tag| format!("#{}", tag.trim_start_matches('#')))
            .collect();
        format!("{}\n\n{}", caption, tags.join(" "))
    }
}

/// Poll the container status until `FINISHED`. `ERROR` is immediately
/// fatal; anything else keeps polling until the attempts run out, after
/// which the container is assumed expired.
pub(crate) async fn wait_for_container<F, Fut>(
    mut fetch_status: F,
    attempts: u32,
    interval: Duration,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    for attempt in 1..=attempts {
        let status = fetch_status().await?;
        debug!(attempt, %status, "Instagram container status");
        match status.as_str() {
            "FINISHED" => return Ok(()),
            "ERROR" => {
                return Err(PlatformError::ContainerProcessing(
                    "Instagram reported an error while processing the media container"
                        .to_string(),
                )
                .into())
            }
            _ => {
                if attempt < attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Err(PlatformError::ContainerNotReady(format!(
        "Media container not ready after {} attempts; it may have expired",
        attempts
    ))
    .into())
}

async fn api_error(response: reqwest::Response) -> crate::error::CrosscastError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    PlatformError::Api {
        platform: "instagram".to_string(),
        message: format!("{}: {}", status, graph_error_message(&body)),
    }
    .into()
}

#[async_trait]
impl PlatformPublisher for InstagramPublisher {
    fn channel(&self) -> Channel {
        Channel::Instagram
    }

    fn character_limit(&self) -> usize {
        CAPTION_MAX
    }

    fn validate_request(&self, request: &PublishRequest) -> Result<()> {
        if request.image_url.as_deref().unwrap_or("").trim().is_empty() {
            return Err(
                PlatformError::Validation("imageUrl is required for Instagram".to_string()).into(),
            );
        }
        if request.text.trim().is_empty() {
            return Err(PlatformError::Validation("Caption is required".to_string()).into());
        }
        let full_caption = build_full_caption(&request.text, &request.hashtags);
        let len = full_caption.chars().count();
        if len > CAPTION_MAX {
            return Err(PlatformError::Validation(format!(
                "Caption too long: {} characters with hashtags, Instagram limit is {}",
                len, CAPTION_MAX
            ))
            .into());
        }
        Ok(())
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        token: &str,
        request: &PublishRequest,
    ) -> Result<PublishReceipt> {
        self.validate_request(request)?;
        // validate_request guarantees the image is present
        let image_url = request.image_url.as_deref().unwrap_or_default();
        let full_caption = build_full_caption(&request.text, &request.hashtags);

        let ig_user_id = self.resolve_business_account(account, token).await?;

        let (container_id, initial_status) = self
            .create_container(&ig_user_id, token, image_url, &full_caption)
            .await?;
        debug!(%container_id, ?initial_status, "Created Instagram media container");

        if initial_status.as_deref() != Some("FINISHED") {
            wait_for_container(
                || self.container_status(&container_id, token),
                POLL_ATTEMPTS,
                POLL_INTERVAL,
            )
            .await?;
        }

        let media_id = self
            .publish_container(&ig_user_id, token, &container_id)
            .await?;

        info!(post_id = %media_id, "Published to Instagram");
        Ok(PublishReceipt {
            id: media_id,
            activity: None,
        })
    }
}
