//! Logging for all Dupcast binaries
//!
//! Two independent sinks:
//! - Console output through `tracing`, configured by [`LoggingConfig`]
//!   (text, JSON, or pretty output; env-filter levels)
//! - The append-only run log file, written by [`RunLog`]
//!
//! # Examples
//!
//! ```no_run
//! use libdupcast::logging::{LoggingConfig, LogFormat, RunLog};
//!
//! # async fn example() {
//! // Initialize console logging with JSON format
//! let config = LoggingConfig::new(LogFormat::Json, "info".to_string(), false);
//! config.init();
//!
//! // Append a block to the run log
//! let log = RunLog::new("log.txt");
//! log.info("Bot created").await;
//! # }
//! ```

use chrono::Local;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Configuration for logging initialization
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    /// Create a new logging configuration
    ///
    /// # Arguments
    ///
    /// * `format` - Log output format (text, json, or pretty)
    /// * `level` - Minimum log level (error, warn, info, debug, trace)
    /// * `verbose` - If true, defaults to debug level
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Initialize logging with the configured settings
    ///
    /// This should be called once at the start of your program. A second
    /// call leaves the first subscriber in place.
    pub fn init(&self) {
        use tracing_subscriber::EnvFilter;

        // Determine the filter based on verbose flag and level
        let filter = if self.verbose {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
        };

        match self.format {
            LogFormat::Json => {
                // JSON output for machine parsing (production/monitoring)
                // Outputs one JSON object per line to stderr
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .try_init()
                    .ok();
            }
            LogFormat::Pretty => {
                // Pretty output with colors for development
                tracing_subscriber::fmt()
                    .pretty()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .try_init()
                    .ok();
            }
            LogFormat::Text => {
                // Plain text output for piping/basic usage
                // Less verbose for end users
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true)
                    .try_init()
                    .ok();
            }
        }
    }
}

/// Initialize logging from the environment
///
/// Respects `DUPCAST_LOG_FORMAT` and `DUPCAST_LOG_LEVEL`. Falls back to text
/// format with info level if not set; `verbose` forces debug.
///
/// # Examples
///
/// ```bash
/// # Use JSON logging
/// export DUPCAST_LOG_FORMAT=json
/// export DUPCAST_LOG_LEVEL=debug
/// dup-once
/// ```
pub fn init_from_env(verbose: bool) {
    let format = std::env::var("DUPCAST_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);

    let level = std::env::var("DUPCAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, verbose).init();
}

const BLOCK_RULE: &str = "=============================";

/// Append-only log file of delimited blocks
///
/// Each entry looks like:
///
/// ```text
///
/// ==============Sat Oct 18 2026 14:00:00 +0000===============
/// message
/// =============================
/// ```
///
/// Write failures are reported through `tracing` and otherwise ignored, so
/// logging never fails a run.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: Option<PathBuf>,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that writes nothing
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an informational block
    pub async fn info(&self, message: &str) {
        self.append(&format_block(message, true)).await;
    }

    /// Append an error block with the error's full source chain
    pub async fn error(&self, error: &(dyn std::error::Error + Send + Sync + 'static)) {
        self.append(&format_block(&error_chain(error), true)).await;
    }

    async fn append(&self, entry: &str) {
        let Some(path) = &self.path else {
            return;
        };

        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(entry.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!("Couldn't write to log file {}: {}", path.display(), e);
        }
    }
}

/// Wrap `message` in a delimited block, optionally stamped with local time
pub fn format_block(message: &str, show_timestamp: bool) -> String {
    let timestamp = if show_timestamp {
        Local::now().format("%a %b %d %Y %H:%M:%S %z").to_string()
    } else {
        String::new()
    };

    format!(
        "\n=============={}===============\n{}\n{}\n",
        timestamp, message, BLOCK_RULE
    )
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(&format!("\nCaused by: {}", cause));
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);

        // Case insensitive
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("Json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    }

    #[test]
    fn test_log_format_from_str_invalid() {
        let result = "invalid".parse::<LogFormat>();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .contains("Invalid log format: 'invalid'"));
    }

    #[test]
    fn test_log_format_display() {
        assert_eq!(LogFormat::Text.to_string(), "text");
        assert_eq!(LogFormat::Json.to_string(), "json");
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
    }

    #[test]
    fn test_logging_config_new() {
        let config = LoggingConfig::new(LogFormat::Json, "debug".to_string(), true);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "debug");
        assert!(config.verbose);
    }

    #[test]
    fn test_format_block_without_timestamp() {
        assert_eq!(
            format_block("hello", false),
            "\n=============================\nhello\n=============================\n"
        );
    }

    #[test]
    fn test_format_block_with_timestamp() {
        let block = format_block("hello", true);
        let header = block.lines().nth(1).unwrap();
        assert!(header.starts_with("=============="));
        assert!(header.ends_with("==============="));
        assert!(header.len() > 29);
        assert!(block.ends_with("hello\n=============================\n"));
    }

    #[tokio::test]
    async fn test_run_log_appends_blocks() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("log.txt");
        let log = RunLog::new(&path);

        log.info("first").await;
        log.info("second").await;

        let content = std::fs::read_to_string(&path).unwrap();
        let first = content.find("first").unwrap();
        let second = content.find("second").unwrap();
        assert!(first < second);
        assert_eq!(content.matches(BLOCK_RULE).count(), 2);
    }

    #[tokio::test]
    async fn test_run_log_error_includes_sources() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("log.txt");
        let log = RunLog::new(&path);

        let error = crate::error::DupcastError::Config(crate::error::ConfigError::ReadError(
            std::io::Error::new(std::io::ErrorKind::NotFound, "no config here"),
        ));
        log.error(&error).await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Configuration error"));
        assert!(content.contains("Caused by: Failed to read config file"));
    }

    #[tokio::test]
    async fn test_run_log_unwritable_path_is_ignored() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        // A directory cannot be opened for appending
        let log = RunLog::new(temp_dir.path());

        log.info("dropped").await;
    }

    #[tokio::test]
    async fn test_disabled_run_log_writes_nothing() {
        let log = RunLog::disabled();
        assert!(log.path().is_none());
        log.info("nowhere").await;
    }
}
