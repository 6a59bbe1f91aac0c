//! Configuration loader and validator for the sync tool.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::model::Service;
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("No `{0}` section configured")]
    MissingService(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub sync: SyncSettings,
    #[serde(default)]
    pub flickr: Option<Flickr>,
    #[serde(default)]
    pub twitter: Option<Twitter>,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// Paging and retry knobs shared by every service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    pub page_size: u32,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub max_backoff_seconds: u64,
}

/// Flickr API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flickr {
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Twitter API v2 settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Twitter {
    pub bearer_token: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl App {
    /// Data directory with a leading `~/` expanded against `$HOME`.
    pub fn resolved_data_dir(&self) -> String {
        if let Some(rest) = self.data_dir.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return format!("{}/{}", home.trim_end_matches('/'), rest);
            }
        }
        self.data_dir.clone()
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    /// `DATABASE_URL` if set, otherwise a SQLite file inside the data dir.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/syncr.db", self.app.resolved_data_dir()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.sync.max_retries,
            base_delay: Duration::from_millis(self.sync.retry_base_ms),
            max_delay: Duration::from_secs(self.sync.max_backoff_seconds),
        }
    }

    pub fn flickr(&self) -> Result<&Flickr, ConfigError> {
        self.flickr
            .as_ref()
            .ok_or(ConfigError::MissingService(Service::Flickr.as_str()))
    }

    pub fn twitter(&self) -> Result<&Twitter, ConfigError> {
        self.twitter
            .as_ref()
            .ok_or(ConfigError::MissingService(Service::Twitter.as_str()))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.sync.page_size == 0 {
        return Err(ConfigError::Invalid("sync.page_size must be > 0"));
    }
    if cfg.sync.retry_base_ms == 0 && cfg.sync.max_retries > 0 {
        return Err(ConfigError::Invalid(
            "sync.retry_base_ms must be > 0 when retries are enabled",
        ));
    }

    if let Some(flickr) = &cfg.flickr {
        if flickr.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("flickr.api_key must be non-empty"));
        }
        if flickr.base_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(ConfigError::Invalid("flickr.base_url must be non-empty when set"));
        }
    }

    if let Some(twitter) = &cfg.twitter {
        if twitter.bearer_token.trim().is_empty() {
            return Err(ConfigError::Invalid("twitter.bearer_token must be non-empty"));
        }
        if twitter.base_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(ConfigError::Invalid("twitter.base_url must be non-empty when set"));
        }
    }

    Ok(())
}

/// Returns the example YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

sync:
  page_size: 500
  max_retries: 3
  retry_base_ms: 500
  max_backoff_seconds: 60

flickr:
  api_key: "YOUR_FLICKR_API_KEY"

twitter:
  bearer_token: "YOUR_TWITTER_BEARER_TOKEN"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.sync.page_size, 500);
        assert_eq!(cfg.flickr().unwrap().api_key, "YOUR_FLICKR_API_KEY");
    }

    #[test]
    fn services_are_optional() {
        let yaml = "app:\n  data_dir: ./d\nsync:\n  page_size: 10\n  max_retries: 0\n  retry_base_ms: 0\n  max_backoff_seconds: 1\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert!(matches!(cfg.flickr(), Err(ConfigError::MissingService("flickr"))));
        assert!(matches!(cfg.twitter(), Err(ConfigError::MissingService("twitter"))));
    }

    #[test]
    fn invalid_page_size() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.sync.page_size = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("page_size")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_credentials() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.flickr.as_mut().unwrap().api_key = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("flickr.api_key")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.twitter.as_mut().unwrap().bearer_token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("twitter.bearer_token")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.twitter.as_mut().unwrap().base_url = Some("".into());
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn retry_policy_from_sync_section() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.twitter().unwrap().bearer_token, "YOUR_TWITTER_BEARER_TOKEN");
    }
}
