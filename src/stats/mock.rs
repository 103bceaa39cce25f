//! In-memory stats engine for exercising collectors without a cluster.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{FsaDirectories, StatValue, StatsEngine, StatsError};

/// Stats engine backed by fixed, per-key responses.
///
/// Keys that were never configured fail like an unknown key on a real
/// cluster. Every call is counted so tests can assert on caching.
#[derive(Debug, Default)]
pub struct MockStatsEngine {
    cluster_name: String,
    stats: HashMap<String, Vec<StatValue>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    fsa_result_id: Option<u64>,
    fsa_directories: HashMap<u64, FsaDirectories>,
    query_calls: Mutex<HashMap<String, usize>>,
    fsa_result_calls: AtomicUsize,
    fsa_directory_calls: AtomicUsize,
}

impl MockStatsEngine {
    /// Create an empty engine for a cluster called `cluster_name`.
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            ..Default::default()
        }
    }

    /// Answer `key` with the given samples.
    pub fn with_stat(mut self, key: impl Into<String>, values: Vec<StatValue>) -> Self {
        self.stats.insert(key.into(), values);
        self
    }

    /// Answer `key` with a single cluster-wide value.
    pub fn with_value(self, key: impl Into<String>, value: f64) -> Self {
        self.with_stat(key, vec![StatValue::new(value)])
    }

    /// Make every query for `key` fail.
    pub fn with_failure(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    /// Delay the answer for `key`, e.g. to trigger query timeouts.
    pub fn with_delay(mut self, key: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(key.into(), delay);
        self
    }

    /// Serve an FSA result set as the latest one.
    pub fn with_fsa(mut self, result_id: u64, directories: FsaDirectories) -> Self {
        self.fsa_result_id = Some(result_id);
        self.fsa_directories.insert(result_id, directories);
        self
    }

    /// How many times `key` was queried.
    pub fn query_calls(&self, key: &str) -> usize {
        self.query_calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// How many times the latest FSA result id was requested.
    pub fn fsa_result_calls(&self) -> usize {
        self.fsa_result_calls.load(Ordering::Relaxed)
    }

    /// How many times an FSA directory dataset was requested.
    pub fn fsa_directory_calls(&self) -> usize {
        self.fsa_directory_calls.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl StatsEngine for MockStatsEngine {
    async fn query(&self, key: &str) -> Result<Vec<StatValue>, StatsError> {
        *self
            .query_calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key.to_string())
            .or_default() += 1;

        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(key) {
            return Err(StatsError::Other(format!("query for '{key}' failed")));
        }
        self.stats
            .get(key)
            .cloned()
            .ok_or_else(|| StatsError::Other(format!("unknown stat key '{key}'")))
    }

    async fn latest_fsa_result_id(&self) -> Result<u64, StatsError> {
        self.fsa_result_calls.fetch_add(1, Ordering::Relaxed);
        self.fsa_result_id
            .ok_or_else(|| StatsError::Other("no FSA results available".to_string()))
    }

    async fn fsa_directories(&self, result_id: u64) -> Result<FsaDirectories, StatsError> {
        self.fsa_directory_calls.fetch_add(1, Ordering::Relaxed);
        self.fsa_directories
            .get(&result_id)
            .cloned()
            .ok_or_else(|| StatsError::Other(format!("unknown FSA result set {result_id}")))
    }

    async fn cluster_name(&self) -> Result<String, StatsError> {
        Ok(self.cluster_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_answers_configured_keys() {
        let engine = MockStatsEngine::new("c1")
            .with_value("cluster.cpu.count", 24.0)
            .with_failure("cluster.cpu.idle.avg");

        let values = engine.query("cluster.cpu.count").await.unwrap();
        assert_eq!(values, vec![StatValue::new(24.0)]);
        assert!(engine.query("cluster.cpu.idle.avg").await.is_err());
        assert!(engine.query("unknown.key").await.is_err());
        assert_eq!(engine.query_calls("cluster.cpu.count"), 1);
        assert_eq!(engine.cluster_name().await.unwrap(), "c1");
    }

    #[tokio::test]
    async fn test_mock_fsa_counts_calls() {
        let engine = MockStatsEngine::new("c1").with_fsa(9, FsaDirectories::default());

        assert_eq!(engine.latest_fsa_result_id().await.unwrap(), 9);
        assert!(engine.fsa_directories(9).await.is_ok());
        assert!(engine.fsa_directories(10).await.is_err());
        assert_eq!(engine.fsa_result_calls(), 1);
        assert_eq!(engine.fsa_directory_calls(), 2);
    }
}
