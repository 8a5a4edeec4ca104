//! Client Configuration
//!
//! Loads the TUI's settings from `$XDG_CONFIG_HOME/manual-qa/client.toml`,
//! then the environment, then command-line flags.
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments (`--base-url`, `--timeout-secs`)
//! 2. Environment variables (`MANUAL_QA_BASE_URL`, `MANUAL_QA_TIMEOUT_SECS`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! base_url = "http://manuals.internal:8000"
//! timeout_secs = 90
//! health_timeout_secs = 3
//!
//! [logging]
//! filter = "manual_tui=debug,manual_conductor=debug"
//! file = "/tmp/manual-tui.log"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use manual_conductor::{ApiConfig, DEFAULT_BASE_URL};

/// Environment variable overriding the backend URL
pub const ENV_BASE_URL: &str = "MANUAL_QA_BASE_URL";

/// Environment variable overriding the request timeout, in seconds
pub const ENV_TIMEOUT_SECS: &str = "MANUAL_QA_TIMEOUT_SECS";

/// Default `EnvFilter` directive when neither `RUST_LOG` nor the file sets one
pub const DEFAULT_LOG_FILTER: &str = "manual_tui=info,manual_conductor=info";

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[backend]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Base URL of the manual QA service
    pub base_url: Option<String>,
    /// `/ask` timeout in seconds
    pub timeout_secs: Option<u64>,
    /// `/health` and `/vehicles` timeout in seconds
    pub health_timeout_secs: Option<u64>,
}

/// `[logging]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingToml {
    /// `EnvFilter` directive
    pub filter: Option<String>,
    /// Log file path
    pub file: Option<PathBuf>,
}

/// Whole configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Backend connection
    pub backend: BackendToml,
    /// Log output
    pub logging: LoggingToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Resolved client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the manual QA service
    pub base_url: String,
    /// `/ask` timeout
    pub request_timeout: Duration,
    /// `/health` and `/vehicles` timeout
    pub health_timeout: Duration,
    /// Log filter from the config file, if any
    pub log_filter: Option<String>,
    /// Log file from the config file, if any
    pub log_file: Option<PathBuf>,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    /// Where the base URL came from
    base_url_source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
            log_filter: None,
            log_file: None,
            config_file_path: None,
            base_url_source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Where the base URL came from
    #[must_use]
    pub fn base_url_source(&self) -> ConfigSource {
        self.base_url_source
    }

    /// Backend settings for [`manual_conductor::HttpManualApi`]
    #[must_use]
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::new(&self.base_url)
            .with_request_timeout(self.request_timeout)
            .with_health_timeout(self.health_timeout)
    }

    /// Log file path, falling back to the user cache directory
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file.clone().or_else(default_log_path)
    }

    /// Check values that would otherwise fail later and less clearly
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a non-HTTP base URL or a
    /// zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "base_url must start with http:// or https:// (got {url:?} from {})",
                self.base_url_source
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.health_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "health timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_toml(&mut self, toml: ClientToml) {
        if let Some(url) = toml.backend.base_url {
            self.base_url = url;
            self.base_url_source = ConfigSource::File;
        }
        if let Some(secs) = toml.backend.timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = toml.backend.health_timeout_secs {
            self.health_timeout = Duration::from_secs(secs);
        }
        self.log_filter = toml.logging.filter;
        self.log_file = toml.logging.file;
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
            self.base_url_source = ConfigSource::Env;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.request_timeout = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value = %raw, "Ignoring non-numeric request timeout from environment"),
            }
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Default config file: `$XDG_CONFIG_HOME/manual-qa/client.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("manual-qa").join("client.toml"))
}

/// Default log file: `$XDG_CACHE_HOME/manual-qa/manual-tui.log`
#[must_use]
pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join("manual-qa").join("manual-tui.log"))
}

/// Directory transcripts are exported to
#[must_use]
pub fn transcript_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("manual-qa").join("transcripts"))
        .unwrap_or_else(std::env::temp_dir)
}

/// Load configuration from the default file and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config(overrides: &ConfigOverrides) -> Result<ClientConfig, ConfigError> {
    let path = overrides.config_path.clone().or_else(default_config_path);
    resolve(path.as_deref(), |key| std::env::var(key).ok(), overrides)
}

/// Resolve configuration from a file, an environment lookup, and overrides
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// the resolved values fail [`ClientConfig::validate`].
pub fn resolve<F>(
    path: Option<&Path>,
    env: F,
    overrides: &ConfigOverrides,
) -> Result<ClientConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ClientConfig::default();

    if let Some(config_path) = path {
        if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.to_path_buf(),
                    source: e,
                })?;
            let toml: ClientToml = toml::from_str(&content)?;
            config.apply_toml(toml);
            config.config_file_path = Some(config_path.to_path_buf());
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    config.apply_env(env);
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides, applied after file and environment
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Alternative config file
    pub config_path: Option<PathBuf>,
    /// Base URL override
    pub base_url: Option<String>,
    /// Request timeout override (seconds)
    pub timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set config file override
    #[must_use]
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set request timeout override
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(ref url) = self.base_url {
            config.base_url = url.clone();
            config.base_url_source = ConfigSource::Cli;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
