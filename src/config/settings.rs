//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default Tushare Pro endpoint.
pub const DEFAULT_API_URL: &str = "http://api.tushare.pro";

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Upstream provider settings.
    #[serde(default)]
    pub tushare: TushareConfig,

    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Session store settings.
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tushare.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "tushare.api_url cannot be empty".to_string(),
            });
        }

        if self.http.host.parse::<IpAddr>().is_err() {
            return Err(ConfigError::ValidationError {
                message: format!("Invalid http.host '{}': expected an IP address", self.http.host),
            });
        }

        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::ValidationError {
                message: "sessions.max_sessions must be at least 1".to_string(),
            });
        }

        if self.sessions.idle_timeout_secs == 0 || self.sessions.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "sessions timeouts must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Applies environment overrides on top of the file values.
    ///
    /// Recognised variables: `TUSHARE_TOKEN`, `TUSHARE_API_URL`, `PORT`.
    /// Empty values are ignored. An unparseable `PORT` is an error rather than
    /// a silent fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is not a valid port number.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("TUSHARE_TOKEN") {
            self.tushare.token = Some(token.trim().to_string());
        }
        if let Some(url) = get("TUSHARE_API_URL") {
            self.tushare.api_url = url.trim().to_string();
        }
        if let Some(port) = get("PORT") {
            self.http.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::ValidationError {
                    message: format!("Invalid PORT '{port}'"),
                })?;
        }

        Ok(())
    }
}

/// Tushare Pro settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TushareConfig {
    /// Process-wide fallback token. Per-request headers take precedence.
    #[serde(default)]
    pub token: Option<String>,

    /// API endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for TushareConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// HTTP transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

/// Session store settings for the HTTP transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are evicted.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Upper bound on live sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// How often the idle sweep runs.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    /// Idle timeout as a [`Duration`].
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Sweep interval as a [`Duration`].
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            max_sessions: default_max_sessions(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

const fn default_idle_timeout() -> u64 {
    30 * 60
}

const fn default_max_sessions() -> usize {
    1024
}

const fn default_sweep_interval() -> u64 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.tushare.api_url, DEFAULT_API_URL);
        assert!(config.tushare.token.is_none());
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "tushare": {
                "token": "abc123",
                "api_url": "http://localhost:9000"
            },
            "http": {
                "host": "127.0.0.1",
                "port": 8088
            },
            "sessions": {
                "idle_timeout_secs": 600,
                "max_sessions": 16,
                "sweep_interval_secs": 5
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.tushare.token.as_deref(), Some("abc123"));
        assert_eq!(config.tushare.api_url, "http://localhost:9000");
        assert_eq!(config.http.host, "127.0.0.1");
        assert_eq!(config.http.port, 8088);
        assert_eq!(config.sessions.idle_timeout(), Duration::from_secs(600));
        assert_eq!(config.sessions.max_sessions, 16);
        assert_eq!(config.sessions.sweep_interval(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn section_defaults() {
        let http = HttpConfig::default();
        assert_eq!(http.host, "0.0.0.0");
        assert_eq!(http.port, 3000);

        let sessions = SessionConfig::default();
        assert_eq!(sessions.idle_timeout_secs, 1800);
        assert_eq!(sessions.max_sessions, 1024);
        assert_eq!(sessions.sweep_interval_secs, 60);

        assert_eq!(LoggingConfig::default().level, "warn");
    }

    #[test]
    fn reject_invalid_host() {
        let json = r#"{ "http": { "host": "not-an-ip" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_zero_session_limit() {
        let json = r#"{ "sessions": { "max_sessions": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("TUSHARE_TOKEN", " from-env "),
            ("PORT", "4100"),
            ("TUSHARE_API_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.tushare.token = Some("from-file".to_string());
        config
            .apply_env(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.tushare.token.as_deref(), Some("from-env"));
        assert_eq!(config.http.port, 4100);
        assert_eq!(config.tushare.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn env_rejects_bad_port() {
        let mut config = Config::default();
        let result = config.apply_env(|key| (key == "PORT").then(|| "http".to_string()));
        assert!(result.is_err());
    }
}
