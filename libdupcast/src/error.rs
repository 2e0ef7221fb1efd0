//! Error types for Dupcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DupcastError>;

#[derive(Error, Debug)]
pub enum DupcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("A duplication run is already in progress")]
    RunInProgress,

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DupcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DupcastError::Config(_) => 2,
            DupcastError::Source(SourceError::Authentication(_)) => 2,
            DupcastError::Source(_) => 1,
            DupcastError::Pipeline(_) => 1,
            DupcastError::RunInProgress => 1,
            DupcastError::Scheduler(_) => 1,
            DupcastError::Io(_) => 1,
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

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Failures reported by a [`PostSource`](crate::sources::PostSource)
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("Account lookup failed: {0}")]
    Lookup(String),

    #[error("Timeline fetch failed: {0}")]
    Fetch(String),

    #[error("Publishing failed: {0}")]
    Publish(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}
