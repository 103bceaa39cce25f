//! HTTPS client for the cluster platform API.
//!
//! Holds one authenticated `reqwest` client for the lifetime of the process;
//! collectors share it through [`StatsEngine`].

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::ClusterConfig;
use crate::stats::{FsaDirectories, StatValue, StatsEngine, StatsError};

/// Upper bound for a single HTTP exchange, independent of the scrape timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const STATS_CURRENT_PATH: &str = "platform/1/statistics/current";
const FSA_RESULTS_PATH: &str = "platform/1/fsa/results";
const CLUSTER_CONFIG_PATH: &str = "platform/1/cluster/config";

/// Authenticated client for one cluster.
#[derive(Clone)]
pub struct ClusterClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl ClusterClient {
    /// Build a client from cluster settings.
    ///
    /// The password is read from the environment variable named by
    /// `password_env`; it is never part of the configuration itself.
    ///
    /// # Errors
    /// Returns `StatsError::Credentials` when the variable is unset or empty,
    /// and `StatsError::Other` when the base URL cannot be formed.
    pub fn connect(config: &ClusterConfig) -> Result<Self, StatsError> {
        let password = std::env::var(&config.password_env)
            .ok()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| StatsError::Credentials(config.password_env.clone()))?;

        let base_url = config.base_url().map_err(|e| StatsError::Other(e.to_string()))?;

        let http = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(config.insecure_tls)
            .build()?;

        tracing::debug!(url = %base_url, username = %config.username, "Cluster client created");

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password,
        })
    }

    /// Base URL of the cluster API.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, StatsError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| StatsError::Other(format!("invalid path '{path}': {e}")))?;

        let response = self
            .http
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| StatsError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl StatsEngine for ClusterClient {
    async fn query(&self, key: &str) -> Result<Vec<StatValue>, StatsError> {
        let response: StatsResponse = self
            .get_json(STATS_CURRENT_PATH, &[("key", key), ("devid", "all")])
            .await?;
        response.into_values(key)
    }

    async fn latest_fsa_result_id(&self) -> Result<u64, StatsError> {
        let response: FsaResultsResponse = self.get_json(FSA_RESULTS_PATH, &[]).await?;
        response.latest_id()
    }

    async fn fsa_directories(&self, result_id: u64) -> Result<FsaDirectories, StatsError> {
        let path = format!("platform/3/fsa/results/{result_id}/directories");
        self.get_json(&path, &[]).await
    }

    async fn cluster_name(&self) -> Result<String, StatsError> {
        let response: ClusterConfigResponse = self.get_json(CLUSTER_CONFIG_PATH, &[]).await?;
        if response.name.is_empty() {
            return Err(StatsError::Decode("cluster config has no name".to_string()));
        }
        Ok(response.name)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(default)]
    stats: Vec<RawStat>,
}

#[derive(Debug, Deserialize)]
struct RawStat {
    #[serde(default)]
    devid: Option<i64>,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

impl StatsResponse {
    /// Keep numeric samples only. A per-sample error fails the whole key.
    fn into_values(self, key: &str) -> Result<Vec<StatValue>, StatsError> {
        let mut values = Vec::with_capacity(self.stats.len());
        for stat in self.stats {
            if let Some(err) = stat.error.filter(|e| !e.is_empty()) {
                return Err(StatsError::Other(format!("stat '{key}': {err}")));
            }
            match stat.value.as_f64() {
                Some(value) => values.push(StatValue {
                    value,
                    devid: stat.devid,
                }),
                None => {
                    tracing::debug!(key = %key, value = %stat.value, "Skipping non-numeric stat value");
                }
            }
        }
        Ok(values)
    }
}

#[derive(Debug, Deserialize)]
struct FsaResultsResponse {
    #[serde(default)]
    results: Vec<FsaResult>,
}

#[derive(Debug, Deserialize)]
struct FsaResult {
    id: u64,
}

impl FsaResultsResponse {
    /// Result set ids are assigned monotonically, so the latest is the largest.
    fn latest_id(&self) -> Result<u64, StatsError> {
        self.results
            .iter()
            .map(|r| r.id)
            .max()
            .ok_or_else(|| StatsError::Decode("no FSA result sets available".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ClusterConfigResponse {
    #[serde(default)]
    name: String,
}
