//! Configuration management for Crosscast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub site: SiteConfig,
    pub model: ModelConfig,
    pub linkedin: Option<LinkedinConfig>,
    pub facebook: Option<FacebookConfig>,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// The site the distributed articles live on. The canonical URL appended to
/// LinkedIn and Facebook posts is `{base_url}/{slug}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub base_url: String,
}

impl SiteConfig {
    pub fn canonical_url(&self, slug: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), slug)
    }
}

/// Language-model provider (any OpenAI-compatible chat completions endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_file: Option<String>,
}

/// LinkedIn OAuth application credentials, used by the refresh grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedinConfig {
    pub client_id: String,
    pub client_secret_file: String,
    #[serde(default = "default_linkedin_base")]
    pub api_base: String,
}

/// Facebook/Instagram application credentials, used by the long-lived token
/// exchange. Instagram publishing goes through the same Graph API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub app_id: String,
    pub app_secret_file: String,
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Minimum milliseconds between accepted generations for the same
    /// (target, article) pair.
    pub window_ms: i64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { window_ms: 60_000 }
    }
}

fn default_linkedin_base() -> String {
    "https://api.linkedin.com".to_string()
}

fn default_graph_base() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/crosscast/crosscast.db".to_string(),
            },
            site: SiteConfig {
                base_url: "https://example.com/blog".to_string(),
            },
            model: ModelConfig {
                endpoint: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_file: Some("~/.config/crosscast/model.key".to_string()),
            },
            linkedin: None,
            facebook: None,
            generation: GenerationConfig::default(),
        }
    }

    /// Read the language-model API key from the configured key file.
    pub fn model_api_key(&self) -> Result<Option<String>> {
        match &self.model.api_key_file {
            None => Ok(None),
            Some(path) => {
                let expanded = shellexpand::tilde(path).to_string();
                let key = std::fs::read_to_string(&expanded)
                    .map_err(ConfigError::ReadError)?
                    .trim()
                    .to_string();
                if key.is_empty() {
                    return Err(ConfigError::MissingField(format!(
                        "API key file is empty: {}",
                        expanded
                    ))
                    .into());
                }
                Ok(Some(key))
            }
        }
    }
}

/// Read an OAuth application secret from a file path in the config.
pub fn read_secret_file(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path).to_string();
    let secret = std::fs::read_to_string(&expanded)
        .map_err(ConfigError::ReadError)?
        .trim()
        .to_string();
    if secret.is_empty() {
        return Err(ConfigError::MissingField(format!("Secret file is empty: {}", expanded)).into());
    }
    Ok(secret)
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosscast").join("config.toml"))
}
