//! Stats engine interface.
//!
//! The cluster answers named statistic queries with one or more numeric
//! samples, and serves file-system-analytics (FSA) result sets. Collectors
//! only ever talk to the cluster through [`StatsEngine`], which keeps them
//! independent of the transport.
//!
//! - [`ClusterClient`](crate::client::ClusterClient): HTTPS implementation
//! - [`MockStatsEngine`]: in-memory implementation for tests and dry runs

pub mod mock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mock::MockStatsEngine;

/// Errors returned by stats engine calls.
///
/// Collectors never branch on the variant; any error is a failed query.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The cluster answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be interpreted.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The call did not complete within the configured timeout.
    #[error("timeout elapsed")]
    Timeout,

    /// The credential environment variable is missing or empty.
    #[error("missing credentials: environment variable '{0}' is not set")]
    Credentials(String),

    /// Anything else reported by the engine.
    #[error("{0}")]
    Other(String),
}

/// One raw sample returned for a stat key.
///
/// Cluster-wide keys return a single entry; per-node keys return one entry
/// per node, identified by `devid`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatValue {
    /// Raw numeric value as reported by the engine.
    pub value: f64,
    /// Device (node) id of the entity this sample belongs to.
    #[serde(default)]
    pub devid: Option<i64>,
}

impl StatValue {
    /// Cluster-wide sample with no entity id.
    pub fn new(value: f64) -> Self {
        Self { value, devid: None }
    }

    /// Per-node sample.
    pub fn for_node(devid: i64, value: f64) -> Self {
        Self {
            value,
            devid: Some(devid),
        }
    }
}

/// Directory usage row of an FSA result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsaUsage {
    pub name: String,
    /// Inode-like identifier of the directory.
    pub lin: u64,
    /// Identifier of the parent directory.
    pub parent: u64,
    pub ads_cnt: f64,
    pub dir_cnt: f64,
    pub file_cnt: f64,
    pub log_size_sum: f64,
    pub log_size_sum_overflow: f64,
    pub other_cnt: f64,
    pub phys_size_sum: f64,
}

/// Directory usage dataset of one FSA result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsaDirectories {
    /// Aggregate row for the analysed root.
    pub total_usage: FsaUsage,
    /// One row per reported directory.
    pub usage_data: Vec<FsaUsage>,
}

/// Query interface to the cluster's statistics engine.
///
/// Implementations must be safe for concurrent use: one handle is shared by
/// every collector across every scrape.
#[async_trait::async_trait]
pub trait StatsEngine: Send + Sync + 'static {
    /// Fetch the current samples for one stat key.
    async fn query(&self, key: &str) -> Result<Vec<StatValue>, StatsError>;

    /// Id of the most recent FSA result set.
    async fn latest_fsa_result_id(&self) -> Result<u64, StatsError>;

    /// Directory usage dataset for an FSA result set.
    async fn fsa_directories(&self, result_id: u64) -> Result<FsaDirectories, StatsError>;

    /// Configured name of the cluster.
    async fn cluster_name(&self) -> Result<String, StatsError>;
}
