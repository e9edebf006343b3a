//! Facebook page publisher
//!
//! Text posts go straight to the page feed. Image posts upload the photo
//! unpublished first (so it never appears as a standalone post), then attach
//! it to the feed post via `attached_media`. The photo is not cleaned up if
//! the feed step fails; the orphaned unpublished photo is harmless but
//! worth knowing about when debugging.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{PlatformError, Result};
use crate::types::{Channel, SocialAccount};

use super::{fetch_image_bytes, graph_error_message, PlatformPublisher, PublishReceipt, PublishRequest};

/// Facebook's documented post character limit.
pub const TEXT_MAX: usize = 63_206;
/// Image payload cap.
pub const IMAGE_MAX_BYTES: usize = 4 * 1024 * 1024;

pub struct FacebookPublisher {
    graph_base: String,
    http: reqwest::Client,
}

impl FacebookPublisher {
    pub fn new(graph_base: &str) -> Self {
        Self {
            graph_base: graph_base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn page_id<'a>(&self, account: &'a SocialAccount) -> Result<&'a str> {
        account.page_id.as_deref().ok_or_else(|| {
            PlatformError::Validation("Facebook account has no page id".to_string()).into()
        })
    }

    /// Upload the image to the page's photos edge with `published=false`,
    /// returning the photo id for `attached_media`.
    async fn upload_unpublished_photo(
        &self,
        page_id: &str,
        token: &str,
        image_url: &str,
    ) -> Result<String> {
        let bytes =
            fetch_image_bytes(&self.http, image_url, IMAGE_MAX_BYTES, "facebook").await?;
        debug!(size = bytes.len(), "Fetched image for Facebook upload");

        let part = reqwest::multipart::Part::bytes(bytes).file_name("image");
        let form = reqwest::multipart::Form::new()
            .part("source", part)
            .text("published", "false")
            .text("access_token", token.to_string());

        let url = format!("{}/{}/photos", self.graph_base, page_id);
        let response = self
            .http
            .post(&url)
            .multipart(form)
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

        let photo_id = body["id"].as_str().ok_or_else(|| PlatformError::Api {
            platform: "facebook".to_string(),
            message: "Photo upload response missing id".to_string(),
        })?;

        debug!(%photo_id, "Uploaded unpublished photo");
        Ok(photo_id.to_string())
    }
}

async fn api_error(response: reqwest::Response) -> crate::error::CrosscastError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    PlatformError::Api {
        platform: "facebook".to_string(),
        message: format!("{}: {}", status, graph_error_message(&body)),
    }
    .into()
}

#[async_trait]
impl PlatformPublisher for FacebookPublisher {
    fn channel(&self) -> Channel {
        Channel::Facebook
    }

    fn character_limit(&self) -> usize {
        TEXT_MAX
    }

    fn validate_request(&self, request: &PublishRequest) -> Result<()> {
        if request.text.trim().is_empty() {
            return Err(PlatformError::Validation("Post text is required".to_string()).into());
        }
        let len = request.text.chars().count();
        if len > TEXT_MAX {
            return Err(PlatformError::Validation(format!(
                "Content too long: {} characters, Facebook limit is {}",
                len, TEXT_MAX
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
        let page_id = self.page_id(account)?;

        let mut params: Vec<(&str, String)> = vec![
            ("message", request.text.clone()),
            ("access_token", token.to_string()),
        ];

        if let Some(image_url) = &request.image_url {
            let photo_id = self
                .upload_unpublished_photo(page_id, token, image_url)
                .await?;
            params.push((
                "attached_media",
                serde_json::to_string(&serde_json::json!([{ "media_fbid": photo_id }]))
                    .unwrap_or_default(),
            ));
        }

        let url = format!("{}/{}/feed", self.graph_base, page_id);
        let response = self
            .http
            .post(&url)
            .form(&params)
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

        let id = body["id"].as_str().ok_or_else(|| PlatformError::Api {
            platform: "facebook".to_string(),
            message: "Feed response missing id".to_string(),
        })?;

        info!(post_id = %id, "Published to Facebook");
        Ok(PublishReceipt {
            id: id.to_string(),
            activity: None,
        })
    }
}
