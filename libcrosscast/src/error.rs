//! Error types for Crosscast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosscastError>;

#[derive(Error, Debug)]
pub enum CrosscastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosscastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosscastError::InvalidInput(_) => 3,
            CrosscastError::Credential(_) => 2,
            CrosscastError::Generation(GenerationError::RateLimited { .. }) => 4,
            CrosscastError::Platform(_) => 1,
            CrosscastError::Generation(_) => 1,
            CrosscastError::Config(_) => 1,
            CrosscastError::Store(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Already scheduled: {0}")]
    AlreadyScheduled(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),
}

/// Credential lifecycle failures. All of these surface to the editor as
/// "reconnect your account".
#[derive(Error, Debug, Clone)]
pub enum CredentialError {
    #[error("No {0} account is connected")]
    NotConnected(String),

    #[error("{0} token expired and no refresh credential is stored")]
    ExpiredNoRefresh(String),

    #[error("Failed to refresh {platform} token: {message}")]
    RefreshFailed { platform: String, message: String },
}

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    #[error("Please wait {} second{} before generating {content_type} content again.",
        seconds_remaining(*remaining_ms),
        if seconds_remaining(*remaining_ms) == 1 { "" } else { "s" })]
    RateLimited {
        content_type: String,
        remaining_ms: i64,
    },

    #[error("Failed to parse model response as JSON: {0}")]
    Parse(String),

    #[error("Generated content failed validation: {0}")]
    Schema(String),

    #[error("Language model request failed: {0}")]
    Provider(String),
}

/// Round remaining milliseconds up to whole seconds for the user-facing
/// countdown message.
pub(crate) fn seconds_remaining(remaining_ms: i64) -> i64 {
    (remaining_ms + 999) / 1000
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("{platform} API error: {message}")]
    Api { platform: String, message: String },

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Instagram container not ready: {0}")]
    ContainerNotReady(String),

    #[error("Instagram container processing failed: {0}")]
    ContainerProcessing(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}
