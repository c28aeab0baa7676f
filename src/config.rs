//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// CRM backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_api_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// IoT data API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_url")]
    pub base_url: String,

    /// Static device-data token for the IoT API
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
}

fn default_telemetry_url() -> String {
    "https://industrial.api.ubidots.com/api/v1.6".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_sample_limit() -> usize {
    500
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: default_telemetry_url(),
            token: String::new(),
            poll_interval_secs: default_poll_interval(),
            sample_limit: default_sample_limit(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("aquaview").join("config.toml")),
            Some(PathBuf::from("/etc/aquaview/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // API overrides
        if let Ok(url) = std::env::var("AQUAVIEW_API_URL") {
            self.api.base_url = url;
        }
        if let Ok(timeout) = std::env::var("AQUAVIEW_API_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.api.request_timeout_ms = t;
            }
        }

        // Telemetry overrides
        if let Ok(url) = std::env::var("AQUAVIEW_TELEMETRY_URL") {
            self.telemetry.base_url = url;
        }
        if let Ok(token) = std::env::var("AQUAVIEW_TELEMETRY_TOKEN") {
            self.telemetry.token = token;
        }
        if let Ok(interval) = std::env::var("AQUAVIEW_POLL_INTERVAL_SECS") {
            if let Ok(i) = interval.parse() {
                self.telemetry.poll_interval_secs = i;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("AQUAVIEW_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("AQUAVIEW_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            telemetry: TelemetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Aquaview Configuration
#
# Environment variables override these settings:
# - AQUAVIEW_API_URL
# - AQUAVIEW_API_TIMEOUT_MS
# - AQUAVIEW_TELEMETRY_URL
# - AQUAVIEW_TELEMETRY_TOKEN
# - AQUAVIEW_POLL_INTERVAL_SECS
# - AQUAVIEW_LOG_LEVEL
# - AQUAVIEW_LOG_FORMAT

[api]
# CRM backend base URL
base_url = "http://localhost:8000/api/v1"

# Request timeout (ms)
request_timeout_ms = 10000

[telemetry]
# IoT data API base URL
base_url = "https://industrial.api.ubidots.com/api/v1.6"

# Device-data token
token = ""

# How often to refresh chart series (seconds)
poll_interval_secs = 60

# Maximum samples fetched per variable per poll
sample_limit = 500

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/aquaview/aquaview.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000/api/v1");
        assert_eq!(config.api.request_timeout_ms, 10_000);
        assert_eq!(config.telemetry.poll_interval_secs, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[api]
base_url = "https://crm.example.com/api/v1"

[telemetry]
token = "BBFF-test"
poll_interval_secs = 15
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.api.base_url, "https://crm.example.com/api/v1");
        assert_eq!(config.telemetry.token, "BBFF-test");
        assert_eq!(config.telemetry.poll_interval_secs, 15);
        // Untouched sections fall back to defaults
        assert_eq!(config.api.request_timeout_ms, 10_000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not valid toml [").unwrap();

        let result = Config::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.telemetry.sample_limit, 500);
    }
}
