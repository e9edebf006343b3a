//! LinkedIn publisher
//!
//! Text-only posts are a single ugcPosts call. Image posts are a four-step
//! sequence: fetch the image bytes from their origin, register an upload to
//! get an upload URL and asset URN, PUT the raw bytes, then create the share
//! referencing the asset. A failure at any step aborts the rest.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{PlatformError, Result};
use crate::types::{Channel, SocialAccount};

use super::{fetch_image_bytes, PlatformPublisher, PublishReceipt, PublishRequest};

/// LinkedIn's hard limit for a ugcPost's share commentary.
pub const TEXT_MAX: usize = 3_000;
/// Media description and title are truncated to this, per the API docs.
pub const MEDIA_TEXT_MAX: usize = 200;
/// Image payload cap.
pub const IMAGE_MAX_BYTES: usize = 10 * 1024 * 1024;

pub struct LinkedinPublisher {
    api_base: String,
    http: reqwest::Client,
}

impl LinkedinPublisher {
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Resolve the author URN, calling `/v2/userinfo` only when the account
    /// does not carry a profile id.
    async fn author_urn(&self, account: &SocialAccount, token: &str) -> Result<String> {
        if let Some(profile_id) = &account.profile_id {
            return Ok(format!("urn:li:person:{}", profile_id));
        }

        let url = format!("{}/v2/userinfo", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let profile: Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        let sub = profile["sub"].as_str().ok_or_else(|| PlatformError::Api {
            platform: "linkedin".to_string(),
            message: "userinfo response missing 'sub'".to_string(),
        })?;

        Ok(format!("urn:li:person:{}", sub))
    }

    async fn upload_image(
        &self,
        author_urn: &str,
        token: &str,
        image_url: &str,
    ) -> Result<String> {
        let bytes =
            fetch_image_bytes(&self.http, image_url, IMAGE_MAX_BYTES, "linkedin").await?;
        debug!(size = bytes.len(), "Fetched image for LinkedIn upload");

        let register_url = format!("{}/v2/assets?action=registerUpload", self.api_base);
        let register_body = json!({
            "registerUploadRequest": {
                "recipes": ["urn:li:digitalmediaRecipe:feedshare-image"],
                "owner": author_urn,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent"
                }]
            }
        });

        let response = self
            .http
            .post(&register_url)
            .bearer_auth(token)
            .json(&register_body)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let registration: Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let upload_url = registration["value"]["uploadMechanism"]
            ["com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest"]["uploadUrl"]
            .as_str()
            .ok_or_else(|| PlatformError::Api {
                platform: "linkedin".to_string(),
                message: "registerUpload response missing uploadUrl".to_string(),
            })?;
        let asset = registration["value"]["asset"]
            .as_str()
            .ok_or_else(|| PlatformError::Api {
                platform: "linkedin".to_string(),
                message: "registerUpload response missing asset URN".to_string(),
            })?
            .to_string();

        let put_response = self
            .http
            .put(upload_url)
            .bearer_auth(token)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !put_response.status().is_success() {
            return Err(api_error(put_response).await);
        }

        debug!(%asset, "Image uploaded to LinkedIn");
        Ok(asset)
    }
}

/// Build the ugcPosts share payload. Without an asset the share is
/// `shareMediaCategory = NONE` and carries no `media` key at all.
pub fn build_share_payload(author_urn: &str, text: &str, asset: Option<&str>) -> Value {
    let mut share_content = json!({
        "shareCommentary": { "text": text },
        "shareMediaCategory": if asset.is_some() { "IMAGE" } else { "NONE" },
    });

    if let Some(asset) = asset {
        let media_text: String = text.chars().take(MEDIA_TEXT_MAX).collect();
        share_content["media"] = json!([{
            "status": "READY",
            "media": asset,
            "description": { "text": media_text },
            "title": { "text": media_text },
        }]);
    }

    json!({
        "author": author_urn,
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": share_content
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
        }
    })
}

async fn api_error(response: reqwest::Response) -> crate::error::CrosscastError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or(body);
    PlatformError::Api {
        platform: "linkedin".to_string(),
        message: format!("{}: {}", status, message),
    }
    .into()
}

#[async_trait]
impl PlatformPublisher for LinkedinPublisher {
    fn channel(&self) -> Channel {
        Channel::Linkedin
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
                "Content too long: {} characters, LinkedIn limit is {}",
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

        let author_urn = self.author_urn(account, token).await?;

        let asset = match &request.image_url {
            Some(image_url) => Some(self.upload_image(&author_urn, token, image_url).await?),
            None => None,
        };

        let payload = build_share_payload(&author_urn, &request.text, asset.as_deref());

        let url = format!("{}/v2/ugcPosts", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&payload)
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
        let receipt = parse_share_response(&body)?;

        info!(post_id = %receipt.id, "Published to LinkedIn");
        Ok(receipt)
    }
}

/// Pull the receipt out of a ugcPosts response: the `id` is returned
/// unchanged, the activity URN comes along when present.
pub fn parse_share_response(body: &Value) -> Result<PublishReceipt> {
    let id = body["id"].as_str().ok_or_else(|| PlatformError::Api {
        platform: "linkedin".to_string(),
        message: "ugcPosts response missing id".to_string(),
    })?;

    Ok(PublishReceipt {
        id: id.to_string(),
        activity: body["activity"].as_str().map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> LinkedinPublisher {
        LinkedinPublisher::new("https://api.linkedin.com")
    }

    #[test]
    fn test_share_payload_without_image() {
        let payload = build_share_payload("urn:li:person:abc", "Hello", None);
        let content = &payload["specificContent"]["com.linkedin.ugc.ShareContent"];

        assert_eq!(content["shareMediaCategory"], "NONE");
        assert!(content.get("media").is_none());
        assert_eq!(content["shareCommentary"]["text"], "Hello");
        assert_eq!(payload["author"], "urn:li:person:abc");
        assert_eq!(payload["lifecycleState"], "PUBLISHED");
    }

    #[test]
    fn test_share_payload_with_image() {
        let payload =
            build_share_payload("urn:li:person:abc", "Hello", Some("urn:li:digitalmediaAsset:1"));
        let content = &payload["specificContent"]["com.linkedin.ugc.ShareContent"];

        assert_eq!(content["shareMediaCategory"], "IMAGE");
        assert_eq!(content["media"][0]["media"], "urn:li:digitalmediaAsset:1");
        assert_eq!(content["media"][0]["status"], "READY");
    }

    #[test]
    fn test_share_payload_truncates_media_text() {
        let long_text = "y".repeat(500);
        let payload = build_share_payload("urn:li:person:abc", &long_text, Some("urn:asset"));
        let content = &payload["specificContent"]["com.linkedin.ugc.ShareContent"];

        // Commentary keeps the full text; only the media fields are cut
        assert_eq!(
            content["shareCommentary"]["text"].as_str().unwrap().len(),
            500
        );
        assert_eq!(
            content["media"][0]["description"]["text"]
                .as_str()
                .unwrap()
                .chars()
                .count(),
            MEDIA_TEXT_MAX
        );
    }

    #[test]
    fn test_parse_share_response_id_unchanged() {
        let body = serde_json::json!({ "id": "urn:li:ugcPost:1" });
        let receipt = parse_share_response(&body).unwrap();
        assert_eq!(receipt.id, "urn:li:ugcPost:1");
        assert_eq!(receipt.activity, None);

        let body = serde_json::json!({ "id": "urn:li:ugcPost:2", "activity": "urn:li:activity:9" });
        let receipt = parse_share_response(&body).unwrap();
        assert_eq!(receipt.activity, Some("urn:li:activity:9".to_string()));
    }

    #[test]
    fn test_validate_empty_text() {
        let request = PublishRequest::default();
        assert!(publisher().validate_request(&request).is_err());
    }

    #[test]
    fn test_validate_text_at_limit() {
        let request = PublishRequest {
            text: "x".repeat(TEXT_MAX),
            ..Default::default()
        };
        publisher().validate_request(&request).unwrap();
    }

    #[test]
    fn test_validate_text_over_limit() {
        let request = PublishRequest {
            text: "x".repeat(TEXT_MAX + 1),
            ..Default::default()
        };
        let result = publisher().validate_request(&request);
        match result {
            Err(crate::error::CrosscastError::Platform(PlatformError::Validation(msg))) => {
                assert!(msg.contains("Content too long"));
            }
            other => panic!("Expected Validation, got {:?}", other.err()),
        }
    }
}
