//! Configuration management for Dupcast
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`$DUPCAST_CONFIG`, else `<config dir>/dupcast/config.toml`)
//! 3. Environment variables (a `.env` file in the working directory is loaded first)
//!
//! ```toml
//! [source]
//! instance = "https://mastodon.social"
//!
//! [source.credentials]
//! access_token = "..."
//!
//! [duplicate]
//! source_account = "paceaux"
//! target_account = "madebypaceaux"
//! limit = 40
//! delay_days = 1.0
//!
//! [schedule]
//! cron = "0 */2 * * *"
//!
//! [http]
//! port = 3000
//!
//! [log]
//! file = "log.txt"
//! ```

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, DupcastError, Result};

pub const DEFAULT_INSTANCE: &str = "https://mastodon.social";
pub const DEFAULT_SOURCE_ACCOUNT: &str = "paceaux";
pub const DEFAULT_TARGET_ACCOUNT: &str = "madebypaceaux";
pub const DEFAULT_DUPLICATE_AMOUNT: u32 = 40;
pub const DEFAULT_DAY_DELAY: f64 = 1.0;
/// Every two hours, on the hour
pub const DEFAULT_CRON_SCHEDULE: &str = "0 0 */2 * * *";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOG_FILE: &str = "log.txt";

#[derive(Debug)]
pub struct Config {
    pub source: SourceConfig,
    pub duplicate: DuplicateConfig,
    pub schedule: ScheduleConfig,
    pub http: HttpConfig,
    pub log: LogConfig,
}

/// Where posts are read from and written to
#[derive(Debug)]
pub struct SourceConfig {
    pub instance: String,
    pub credentials: CredentialsConfig,
}

/// API credentials
///
/// The Mastodon client authenticates with `access_token` (or `bearer_token`
/// when no access token is set). The consumer pair and `access_secret`
/// belong to the app registration and are carried for clients that sign
/// requests themselves.
#[derive(Debug, Default)]
pub struct CredentialsConfig {
    pub consumer_key: Option<SecretString>,
    pub consumer_secret: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub access_secret: Option<SecretString>,
    pub bearer_token: Option<SecretString>,
}

/// Inputs to one duplication run
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateConfig {
    pub source_account: String,
    pub target_account: String,
    /// Maximum posts requested from each timeline
    pub limit: u32,
    /// Minimum age, in days, before a post is eligible
    pub delay_days: f64,
}

impl DuplicateConfig {
    /// Check the limit is positive and the delay a non-negative finite number
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(DupcastError::Pipeline(
                "Duplicate limit must be at least 1".to_string(),
            ));
        }

        if !self.delay_days.is_finite() || self.delay_days < 0.0 {
            return Err(DupcastError::Pipeline(format!(
                "Day delay must be a non-negative number (got {})",
                self.delay_days
            )));
        }

        Ok(())
    }
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            source_account: DEFAULT_SOURCE_ACCOUNT.to_string(),
            target_account: DEFAULT_TARGET_ACCOUNT.to_string(),
            limit: DEFAULT_DUPLICATE_AMOUNT,
            delay_days: DEFAULT_DAY_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Six-field (seconds first) cron expression
    pub cron: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub file: PathBuf,
}

/// On-disk shape of the TOML file; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    source: FileSource,
    duplicate: FileDuplicate,
    schedule: FileSchedule,
    http: FileHttp,
    log: FileLog,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSource {
    instance: Option<String>,
    credentials: FileCredentials,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileCredentials {
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    access_token: Option<String>,
    access_secret: Option<String>,
    bearer_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileDuplicate {
    source_account: Option<String>,
    target_account: Option<String>,
    limit: Option<u32>,
    delay_days: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSchedule {
    cron: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileHttp {
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileLog {
    file: Option<String>,
}

impl Config {
    /// Load configuration from the default file location and the environment
    pub fn load() -> Result<Self> {
        load_dotenv();

        let file = match std::env::var("DUPCAST_CONFIG") {
            Ok(path) => {
                let path = PathBuf::from(shellexpand::tilde(&path).to_string());
                Some(read_file_config(&path)?)
            }
            Err(_) => {
                let path = resolve_config_path()?;
                if path.exists() {
                    Some(read_file_config(&path)?)
                } else {
                    None
                }
            }
        };

        Self::resolve(file.unwrap_or_default(), |key| std::env::var(key).ok())
    }

    /// Load configuration from a specific file, then apply the environment
    pub fn load_from_path(path: &Path) -> Result<Self> {
        load_dotenv();
        let file = read_file_config(path)?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Build a configuration from TOML text and an explicit variable lookup
    pub fn from_toml_and_vars<F>(toml_text: &str, vars: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = toml::from_str(toml_text).map_err(ConfigError::ParseError)?;
        Self::resolve(file, vars)
    }

    fn resolve<F>(file: FileConfig, vars: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| vars(key).filter(|value| !value.trim().is_empty());
        let secret = |key: &str, fallback: Option<String>| {
            var(key).or(fallback).map(SecretString::from)
        };

        let credentials = CredentialsConfig {
            consumer_key: secret("DUPCAST_CONSUMER_KEY", file.source.credentials.consumer_key),
            consumer_secret: secret(
                "DUPCAST_CONSUMER_SECRET",
                file.source.credentials.consumer_secret,
            ),
            access_token: secret("DUPCAST_ACCESS_TOKEN", file.source.credentials.access_token),
            access_secret: secret("DUPCAST_ACCESS_SECRET", file.source.credentials.access_secret),
            bearer_token: secret("DUPCAST_BEARER_TOKEN", file.source.credentials.bearer_token),
        };

        let source = SourceConfig {
            instance: var("DUPCAST_INSTANCE")
                .or(file.source.instance)
                .unwrap_or_else(|| DEFAULT_INSTANCE.to_string()),
            credentials,
        };

        let limit = match var("DUPCAST_DUPLICATE_AMOUNT") {
            Some(value) => parse_var("DUPCAST_DUPLICATE_AMOUNT", &value)?,
            None => file.duplicate.limit.unwrap_or(DEFAULT_DUPLICATE_AMOUNT),
        };
        let delay_days = match var("DUPCAST_DAY_DELAY") {
            Some(value) => parse_var("DUPCAST_DAY_DELAY", &value)?,
            None => file.duplicate.delay_days.unwrap_or(DEFAULT_DAY_DELAY),
        };

        let duplicate = DuplicateConfig {
            source_account: var("DUPCAST_SOURCE_ACCOUNT")
                .or(file.duplicate.source_account)
                .unwrap_or_else(|| DEFAULT_SOURCE_ACCOUNT.to_string()),
            target_account: var("DUPCAST_TARGET_ACCOUNT")
                .or(file.duplicate.target_account)
                .unwrap_or_else(|| DEFAULT_TARGET_ACCOUNT.to_string()),
            limit,
            delay_days,
        };
        if duplicate.validate().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "duplicate".to_string(),
                value: format!("limit={}, delay_days={}", limit, delay_days),
            }
            .into());
        }

        let cron = var("DUPCAST_CRON_SCHEDULE")
            .or(file.schedule.cron)
            .unwrap_or_else(|| DEFAULT_CRON_SCHEDULE.to_string());

        let port = match var("PORT") {
            Some(value) => parse_var("PORT", &value)?,
            None => file.http.port.unwrap_or(DEFAULT_PORT),
        };

        let log_file = var("DUPCAST_LOG_FILE")
            .or(file.log.file)
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());

        Ok(Self {
            source,
            duplicate,
            schedule: ScheduleConfig {
                cron: normalize_cron(&cron)?,
            },
            http: HttpConfig { port },
            log: LogConfig {
                file: PathBuf::from(shellexpand::tilde(&log_file).to_string()),
            },
        })
    }
}

/// Load a `.env` file from the working directory (or a parent), if present
fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
    let file: FileConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
    Ok(file)
}

fn parse_var<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

/// Normalize a cron expression to the six-field, seconds-first form
///
/// Classic five-field crontab lines get a leading `0` seconds field.
/// Six- and seven-field expressions pass through unchanged.
pub fn normalize_cron(expr: &str) -> Result<String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 | 7 => Ok(fields.join(" ")),
        _ => Err(ConfigError::InvalidValue {
            field: "schedule.cron".to_string(),
            value: expr.to_string(),
        }
        .into()),
    }
}

/// Default configuration file path under the platform config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("dupcast").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = Config::from_toml_and_vars("", vars(&[])).unwrap();

        assert_eq!(config.source.instance, DEFAULT_INSTANCE);
        assert!(config.source.credentials.access_token.is_none());
        assert_eq!(config.duplicate, DuplicateConfig::default());
        assert_eq!(config.duplicate.limit, 40);
        assert_eq!(config.duplicate.delay_days, 1.0);
        assert_eq!(config.schedule.cron, "0 0 */2 * * *");
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.log.file, PathBuf::from("log.txt"));
    }

    #[test]
    fn test_file_values_are_used() {
        let toml_text = r#"
[source]
instance = "fosstodon.org"

[source.credentials]
access_token = "file-token"

[duplicate]
source_account = "alice"
target_account = "alice_mirror"
limit = 10
delay_days = 0.5

[schedule]
cron = "*/15 * * * *"

[http]
port = 8080
"#;
        let config = Config::from_toml_and_vars(toml_text, vars(&[])).unwrap();

        assert_eq!(config.source.instance, "fosstodon.org");
        assert_eq!(
            config
                .source
                .credentials
                .access_token
                .as_ref()
                .unwrap()
                .expose_secret(),
            "file-token"
        );
        assert_eq!(config.duplicate.source_account, "alice");
        assert_eq!(config.duplicate.target_account, "alice_mirror");
        assert_eq!(config.duplicate.limit, 10);
        assert_eq!(config.duplicate.delay_days, 0.5);
        assert_eq!(config.schedule.cron, "0 */15 * * * *");
        assert_eq!(config.http.port, 8080);
    }

    #[test]
    fn test_env_overrides_file() {
        let toml_text = r#"
[duplicate]
source_account = "alice"
limit = 10
"#;
        let config = Config::from_toml_and_vars(
            toml_text,
            vars(&[
                ("DUPCAST_SOURCE_ACCOUNT", "bob"),
                ("DUPCAST_DUPLICATE_AMOUNT", "25"),
                ("DUPCAST_DAY_DELAY", "2.5"),
                ("DUPCAST_BEARER_TOKEN", "bearer"),
                ("PORT", "9000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.duplicate.source_account, "bob");
        assert_eq!(config.duplicate.limit, 25);
        assert_eq!(config.duplicate.delay_days, 2.5);
        assert!(config.source.credentials.bearer_token.is_some());
        assert_eq!(config.http.port, 9000);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let config =
            Config::from_toml_and_vars("", vars(&[("DUPCAST_SOURCE_ACCOUNT", "  ")])).unwrap();
        assert_eq!(config.duplicate.source_account, DEFAULT_SOURCE_ACCOUNT);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let result =
            Config::from_toml_and_vars("", vars(&[("DUPCAST_DUPLICATE_AMOUNT", "lots")]));
        match result {
            Err(DupcastError::Config(ConfigError::InvalidValue { field, value })) => {
                assert_eq!(field, "DUPCAST_DUPLICATE_AMOUNT");
                assert_eq!(value, "lots");
            }
            other => panic!("Expected invalid value error, got {:?}", other),
        }

        assert!(Config::from_toml_and_vars("", vars(&[("PORT", "70000")])).is_err());
        assert!(Config::from_toml_and_vars("", vars(&[("DUPCAST_DAY_DELAY", "-1")])).is_err());
        assert!(
            Config::from_toml_and_vars("", vars(&[("DUPCAST_DUPLICATE_AMOUNT", "0")])).is_err()
        );
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let result = Config::from_toml_and_vars("[duplicate\nlimit = ", vars(&[]));
        assert!(matches!(
            result,
            Err(DupcastError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_normalize_cron() {
        assert_eq!(normalize_cron("* */2 * * *").unwrap(), "0 * */2 * * *");
        assert_eq!(normalize_cron("0 0 */2 * * *").unwrap(), "0 0 */2 * * *");
        assert_eq!(
            normalize_cron("0 0 12 * * Mon 2030").unwrap(),
            "0 0 12 * * Mon 2030"
        );
        assert_eq!(normalize_cron("  0   */2 * * * ").unwrap(), "0 0 */2 * * *");
        assert!(normalize_cron("every two hours").is_err());
        assert!(normalize_cron("").is_err());
    }

    #[test]
    fn test_duplicate_config_validate() {
        assert!(DuplicateConfig::default().validate().is_ok());

        let zero_limit = DuplicateConfig {
            limit: 0,
            ..Default::default()
        };
        assert!(zero_limit.validate().is_err());

        let nan_delay = DuplicateConfig {
            delay_days: f64::NAN,
            ..Default::default()
        };
        assert!(nan_delay.validate().is_err());

        let zero_delay = DuplicateConfig {
            delay_days: 0.0,
            ..Default::default()
        };
        assert!(zero_delay.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_from_path_reads_file_and_env() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[duplicate]\ntarget_account = \"mirror\"\n").unwrap();

        std::env::set_var("DUPCAST_DAY_DELAY", "3");
        let config = Config::load_from_path(&path);
        std::env::remove_var("DUPCAST_DAY_DELAY");

        let config = config.unwrap();
        assert_eq!(config.duplicate.target_account, "mirror");
        assert_eq!(config.duplicate.delay_days, 3.0);
    }

    #[test]
    #[serial]
    fn test_load_from_missing_path_fails() {
        let result = Config::load_from_path(Path::new("/nonexistent/dupcast/config.toml"));
        assert!(matches!(
            result,
            Err(DupcastError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_load_from_path_reads_dotenv() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[duplicate]\nsource_account = \"alice\"\n").unwrap();
        std::fs::write(
            temp_dir.path().join(".env"),
            "DUPCAST_TARGET_ACCOUNT=from_dotenv\n",
        )
        .unwrap();

        let previous_dir = std::env::current_dir().unwrap();
        std::env::remove_var("DUPCAST_TARGET_ACCOUNT");
        std::env::set_current_dir(temp_dir.path()).unwrap();
        let config = Config::load_from_path(&path);
        std::env::set_current_dir(previous_dir).unwrap();
        std::env::remove_var("DUPCAST_TARGET_ACCOUNT");

        let config = config.unwrap();
        assert_eq!(config.duplicate.source_account, "alice");
        assert_eq!(config.duplicate.target_account, "from_dotenv");
    }
}
