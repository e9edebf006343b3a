//! Credential lifecycle for connected social accounts
//!
//! Every publish asks this module for a usable access token first. Tokens
//! within five minutes of expiry are refreshed proactively so a token cannot
//! die mid-publish.
//!
//! LinkedIn refreshes the member token with the OAuth refresh grant.
//! Facebook and Instagram refresh the long-lived user token via the
//! `fb_exchange_token` grant; the derived page token is kept as-is because
//! page tokens backed by a long-lived user token do not expire on their own.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{read_secret_file, FacebookConfig, LinkedinConfig};
use crate::db::Database;
use crate::error::{CredentialError, Result};
use crate::types::{Channel, SocialAccount};

/// Refresh tokens this close to expiry, in seconds.
pub const EXPIRY_BUFFER_SECS: i64 = 300;

/// Fallback lifetime for a refreshed long-lived Facebook user token when the
/// Graph API omits `expires_in` (60 days, matching its documented lifetime).
const FACEBOOK_DEFAULT_LIFETIME_SECS: i64 = 60 * 24 * 3600;

/// Is the token expired, or close enough to expiry that a publish started
/// now might outlive it?
pub fn token_expiring(expires_at: i64, now: i64) -> bool {
    expires_at - now <= EXPIRY_BUFFER_SECS
}

#[derive(Deserialize)]
struct LinkedinTokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct FacebookTokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
    http: reqwest::Client,
    linkedin: Option<LinkedinConfig>,
    facebook: Option<FacebookConfig>,
}

impl CredentialStore {
    pub fn new(
        db: Database,
        linkedin: Option<LinkedinConfig>,
        facebook: Option<FacebookConfig>,
    ) -> Self {
        Self {
            db,
            http: reqwest::Client::new(),
            linkedin,
            facebook,
        }
    }

    /// The connected account for a channel, or `NotConnected`.
    pub async fn account_for_channel(&self, channel: Channel) -> Result<SocialAccount> {
        self.db
            .account_for_channel(channel)
            .await?
            .ok_or_else(|| CredentialError::NotConnected(channel.to_string()).into())
    }

    /// Disconnect an account, removing the stored credential entirely.
    pub async fn disconnect(&self, account_id: &str) -> Result<()> {
        self.db.delete_social_account(account_id).await
    }

    /// Return an access token that is valid for at least the next five
    /// minutes, refreshing and persisting the account if needed.
    ///
    /// The returned token is the one publishing uses: the page token for
    /// Facebook and Instagram, the member token for LinkedIn.
    pub async fn valid_access_token(&self, account: &SocialAccount) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        if !token_expiring(account.expires_at, now) {
            debug!(
                platform = %account.platform,
                account_id = %account.id,
                "Access token still valid"
            );
            return Ok(account.access_token.clone());
        }

        info!(
            platform = %account.platform,
            account_id = %account.id,
            "Access token expiring, refreshing"
        );

        let refreshed = match account.platform {
            Channel::Linkedin => self.refresh_linkedin(account, now).await?,
            Channel::Facebook | Channel::Instagram => self.refresh_facebook(account, now).await?,
        };

        self.db.upsert_social_account(&refreshed).await?;
        Ok(refreshed.access_token)
    }

    async fn refresh_linkedin(&self, account: &SocialAccount, now: i64) -> Result<SocialAccount> {
        let refresh_token = account.refresh_token.as_deref().ok_or_else(|| {
            CredentialError::ExpiredNoRefresh(account.platform.to_string())
        })?;

        let config = self.linkedin.as_ref().ok_or_else(|| {
            CredentialError::RefreshFailed {
                platform: "linkedin".to_string(),
                message: "LinkedIn application credentials are not configured".to_string(),
            }
        })?;
        let client_secret = read_secret_file(&config.client_secret_file)?;

        let url = format!("{}/oauth/v2/accessToken", config.api_base);
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| CredentialError::RefreshFailed {
                platform: "linkedin".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "LinkedIn token refresh rejected");
            return Err(CredentialError::RefreshFailed {
                platform: "linkedin".to_string(),
                message: format!("{}: {}", status, body),
            }
            .into());
        }

        let token: LinkedinTokenResponse =
            response
                .json()
                .await
                .map_err(|e| CredentialError::RefreshFailed {
                    platform: "linkedin".to_string(),
                    message: format!("Malformed token response: {}", e),
                })?;

        let mut refreshed = account.clone();
        refreshed.access_token = token.access_token;
        refreshed.expires_at = now + token.expires_in;
        // LinkedIn may rotate the refresh token; keep the old one otherwise
        if let Some(new_refresh) = token.refresh_token {
            refreshed.refresh_token = Some(new_refresh);
        }

        info!(expires_at = refreshed.expires_at, "LinkedIn token refreshed");
        Ok(refreshed)
    }

    async fn refresh_facebook(&self, account: &SocialAccount, now: i64) -> Result<SocialAccount> {
        let user_token = account.user_access_token.as_deref().ok_or_else(|| {
            CredentialError::ExpiredNoRefresh(account.platform.to_string())
        })?;

        let config = self.facebook.as_ref().ok_or_else(|| {
            CredentialError::RefreshFailed {
                platform: account.platform.to_string(),
                message: "Facebook application credentials are not configured".to_string(),
            }
        })?;
        let app_secret = read_secret_file(&config.app_secret_file)?;

        let url = format!("{}/oauth/access_token", config.graph_base);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", config.app_id.as_str()),
                ("client_secret", app_secret.as_str()),
                ("fb_exchange_token", user_token),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::RefreshFailed {
                platform: account.platform.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Facebook token exchange rejected");
            return Err(CredentialError::RefreshFailed {
                platform: account.platform.to_string(),
                message: format!("{}: {}", status, body),
            }
            .into());
        }

        let token: FacebookTokenResponse =
            response
                .json()
                .await
                .map_err(|e| CredentialError::RefreshFailed {
                    platform: account.platform.to_string(),
                    message: format!("Malformed token response: {}", e),
                })?;

        let mut refreshed = account.clone();
        // Page token stays; only the backing user token rotates
        refreshed.user_access_token = Some(token.access_token);
        refreshed.expires_at =
            now + token.expires_in.unwrap_or(FACEBOOK_DEFAULT_LIFETIME_SECS);

        info!(
            platform = %account.platform,
            expires_at = refreshed.expires_at,
            "Facebook user token exchanged for a fresh long-lived token"
        );
        Ok(refreshed)
    }
}
