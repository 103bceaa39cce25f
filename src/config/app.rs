//! Application configuration structures.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::DEFAULT_SWEEP_INTERVAL;
use crate::collector::{CollectorRegistry, DEFAULT_QUERY_TIMEOUT};

use super::collector::CollectorSelection;
use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default port of the cluster's platform API.
pub const DEFAULT_CLUSTER_PORT: u16 = 8080;

/// Default environment variable holding the cluster password.
pub const DEFAULT_PASSWORD_ENV: &str = "ISILON_PASSWORD";

/// Default exporter listen port.
pub const DEFAULT_SERVER_PORT: u16 = 9437;

/// Default metrics endpoint path.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Default result cache expiration window, in hours.
pub const DEFAULT_EXPIRATION_HOURS: u64 = 6;

/// Longest accepted cache expiration window, in hours (one year).
pub const MAX_EXPIRATION_HOURS: u64 = 365 * 24;

// =============================================================================
// Cluster Configuration
// =============================================================================

/// Connection settings for the monitored cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Cluster FQDN or IP address.
    pub fqdn: String,

    /// Platform API port (default: 8080).
    pub port: u16,

    /// Username for basic authentication.
    pub username: String,

    /// Name of the environment variable that holds the password.
    pub password_env: String,

    /// Optional `site` label attached to every metric.
    pub site: Option<String>,

    /// Accept self-signed certificates (default: true).
    pub insecure_tls: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            fqdn: String::new(),
            port: DEFAULT_CLUSTER_PORT,
            username: String::new(),
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
            site: None,
            insecure_tls: true,
        }
    }
}

impl ClusterConfig {
    pub fn new(fqdn: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Root URL of the platform API.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("https://{}:{}/", self.fqdn, self.port))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fqdn.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "cluster fqdn must be set".to_string(),
            ));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "cluster username must be set".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationError(
                "cluster port must be non-zero".to_string(),
            ));
        }
        if self.password_env.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "cluster password_env must name an environment variable".to_string(),
            ));
        }
        self.base_url().map_err(|e| {
            ConfigError::ValidationError(format!("invalid cluster address '{}': {}", self.fqdn, e))
        })?;
        Ok(())
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 9437).
    pub port: u16,

    /// Path serving the exposition (default: "/metrics").
    pub metrics_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_SERVER_PORT,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
        }
    }
}

// =============================================================================
// Cache and Scrape Configuration
// =============================================================================

/// Result cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default expiration window in hours (default: 6).
    pub expiration_hours: u64,

    /// Interval of the background sweep of expired entries (default: 10m).
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiration_hours: DEFAULT_EXPIRATION_HOURS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Expiration window as a duration.
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_hours.saturating_mul(60 * 60))
    }
}

/// Scrape behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Timeout of each stats engine call (default: 30s).
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Monitored cluster.
    pub cluster: ClusterConfig,

    /// Web server configuration.
    pub server: ServerConfig,

    /// Result cache configuration.
    pub cache: CacheConfig,

    /// Scrape configuration.
    pub scrape: ScrapeConfig,

    /// Active collector selection.
    pub collectors: CollectorSelection,
}

impl AppConfig {
    /// Read and parse a YAML file without validating it.
    ///
    /// `${VAR}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse YAML text without validating it.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(&expand_env_vars(content))?)
    }

    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cluster.validate()?;

        // Validate server bind address
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        if !self.server.metrics_path.starts_with('/') || self.server.metrics_path.len() < 2 {
            return Err(ConfigError::ValidationError(format!(
                "server metrics_path must start with '/' and not be the root: '{}'",
                self.server.metrics_path
            )));
        }

        if self.cache.expiration_hours == 0 {
            return Err(ConfigError::ValidationError(
                "cache expiration_hours must be positive".to_string(),
            ));
        }

        if self.cache.expiration_hours > MAX_EXPIRATION_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "cache expiration_hours must be at most {}",
                MAX_EXPIRATION_HOURS
            )));
        }

        if self.cache.sweep_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "cache sweep_interval must be non-zero".to_string(),
            ));
        }

        if self.scrape.query_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "scrape query_timeout must be non-zero".to_string(),
            ));
        }

        self.collectors
            .validate(&CollectorRegistry::builtin().names())?;

        Ok(())
    }
}
