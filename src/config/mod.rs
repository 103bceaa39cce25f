//! Configuration module for the exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Cluster connection (FQDN, port, username, credential env var, site)
//! - Server settings (bind address, port, metrics path)
//! - Result cache expiration and sweep interval
//! - Per-call query timeout
//! - Collector selection

mod app;
mod collector;
mod validation;

pub use app::{AppConfig, CacheConfig, ClusterConfig, ScrapeConfig, ServerConfig};
pub use collector::CollectorSelection;
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{
    DEFAULT_CLUSTER_PORT, DEFAULT_EXPIRATION_HOURS, MAX_EXPIRATION_HOURS, DEFAULT_METRICS_PATH, DEFAULT_PASSWORD_ENV,
    DEFAULT_SERVER_PORT,
};
