//! Server configuration.

use std::net::{Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Default request body limit and document size limit: 50 MiB.
const DEFAULT_MAX_PAYLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Configuration for the siteup server.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// Socket address to listen on.
    #[serde(default = "default_listen_address")]
    pub listen: SocketAddr,

    /// Maximum size of a request body.
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: usize,

    /// Chunked upload configuration.
    #[serde(default)]
    pub chunked_upload: ChunkedUploadConfig,

    /// Central database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Chunked upload configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ChunkedUploadConfig {
    /// How long a session may go without chunks before it is evicted.
    #[serde(with = "humantime_serde", default = "default_session_timeout")]
    pub session_timeout: Duration,

    /// How often to look for idle sessions.
    ///
    /// Zero disables eviction.
    #[serde(with = "humantime_serde", default = "default_reaper_interval")]
    pub reaper_interval: Duration,

    /// How long a commit may take before it counts as failed.
    #[serde(with = "humantime_serde", default = "default_commit_timeout")]
    pub commit_timeout: Duration,

    /// Maximum size of a reconstructed document in bytes.
    #[serde(default = "default_max_payload_size")]
    pub max_document_size: usize,
}

/// Central database configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct DatabaseConfig {
    /// Number of committed updates to retain.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Config {
    fn validate(&self) -> Result<()> {
        let chunked = &self.chunked_upload;

        if chunked.session_timeout.is_zero() {
            return Err(anyhow!("chunked-upload.session-timeout must be positive"));
        }

        if chunked.commit_timeout.is_zero() {
            return Err(anyhow!("chunked-upload.commit-timeout must be positive"));
        }

        if chunked.max_document_size == 0 {
            return Err(anyhow!("chunked-upload.max-document-size must be positive"));
        }

        if self.database.history_limit == 0 {
            return Err(anyhow!("database.history-limit must be positive"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_address(),
            max_payload_size: default_max_payload_size(),
            chunked_upload: ChunkedUploadConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for ChunkedUploadConfig {
    fn default() -> Self {
        Self {
            session_timeout: default_session_timeout(),
            reaper_interval: default_reaper_interval(),
            commit_timeout: default_commit_timeout(),
            max_document_size: default_max_payload_size(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from((Ipv6Addr::UNSPECIFIED, 3001))
}

fn default_max_payload_size() -> usize {
    DEFAULT_MAX_PAYLOAD_SIZE
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_reaper_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_commit_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_history_limit() -> usize {
    1000
}

/// Loads the configuration from a TOML string.
pub fn load_config_from_str(s: &str) -> Result<Config> {
    let config: Config = toml::from_str(s)?;
    config.validate()?;
    Ok(config)
}

/// Loads the configuration from a TOML file.
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
    load_config_from_str(&s)
}

/// Loads the configuration, falling back to the defaults without a path.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config_from_path(path),
        None => {
            tracing::info!("No configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = load_config_from_str("").unwrap();

        assert_eq!(config.listen, "[::]:3001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.max_payload_size, 50 * 1024 * 1024);
        assert_eq!(
            config.chunked_upload.session_timeout,
            Duration::from_secs(1800)
        );
        assert_eq!(
            config.chunked_upload.reaper_interval,
            Duration::from_secs(600)
        );
        assert_eq!(config.database.history_limit, 1000);
    }

    #[test]
    fn test_humantime_durations() {
        let config = load_config_from_str(
            r#"
            listen = "127.0.0.1:8080"

            [chunked-upload]
            session-timeout = "5m"
            reaper-interval = "30s"
            commit-timeout = "2s 500ms"
            max-document-size = 1024

            [database]
            history-limit = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.listen, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.chunked_upload.session_timeout, Duration::from_secs(300));
        assert_eq!(config.chunked_upload.reaper_interval, Duration::from_secs(30));
        assert_eq!(
            config.chunked_upload.commit_timeout,
            Duration::from_millis(2500)
        );
        assert_eq!(config.chunked_upload.max_document_size, 1024);
        assert_eq!(config.database.history_limit, 10);
    }

    #[test]
    fn test_reaper_can_be_disabled() {
        let config = load_config_from_str(
            r#"
            [chunked-upload]
            reaper-interval = "0s"
            "#,
        )
        .unwrap();

        assert!(config.chunked_upload.reaper_interval.is_zero());
    }

    #[test]
    fn test_invalid_config() {
        assert!(load_config_from_str("unknown-key = 1").is_err());
        assert!(load_config_from_str(
            r#"
            [chunked-upload]
            session-timeout = "0s"
            "#
        )
        .is_err());
        assert!(load_config_from_str(
            r#"
            [database]
            history-limit = 0
            "#
        )
        .is_err());
    }
}
