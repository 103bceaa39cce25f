//! Construction context shared by all collectors.
//!
//! Built once at startup and passed by reference into every collector
//! factory, so there is no process-wide mutable state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::ResultCache;
use crate::collector::{ConstLabels, MetricDescriptor, Sample, SampleSink, Subsystem};
use crate::stats::{StatsEngine, StatsError};

/// Default per-call timeout for stats engine queries (30 seconds).
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity of the single cluster this process serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIdentity {
    /// Name reported by the cluster itself.
    pub name: String,
    /// Optional site label from configuration.
    pub site: Option<String>,
}

impl ClusterIdentity {
    pub fn new(name: impl Into<String>, site: Option<String>) -> Self {
        Self {
            name: name.into(),
            site: site.filter(|s| !s.is_empty()),
        }
    }

    /// Labels every metric carries: `cluster`, plus `site` when set.
    pub fn const_labels(&self) -> ConstLabels {
        let mut labels = ConstLabels::new();
        labels.insert("cluster".to_string(), self.name.clone());
        if let Some(ref site) = self.site {
            labels.insert("site".to_string(), site.clone());
        }
        labels
    }
}

/// Descriptors for the per-call meta-metrics every collector emits.
#[derive(Debug, Clone)]
pub struct QueryMeta {
    pub call_duration: Arc<MetricDescriptor>,
    pub call_failure: Arc<MetricDescriptor>,
}

impl QueryMeta {
    pub fn new(const_labels: &ConstLabels) -> Self {
        Self {
            call_duration: Arc::new(MetricDescriptor::new(
                Subsystem::Exporter,
                "stats_engine_call_duration_seconds",
                "Duration of the stats engine call for a key, in seconds.",
                &["key"],
                const_labels.clone(),
            )),
            call_failure: Arc::new(MetricDescriptor::new(
                Subsystem::Exporter,
                "stats_engine_call_failure",
                "Whether the stats engine call for a key failed (1) or succeeded (0).",
                &["key"],
                const_labels.clone(),
            )),
        }
    }

    /// Emit the duration and failure samples for one call.
    pub fn record(&self, sink: &SampleSink, key: &str, elapsed: Duration, failed: bool) {
        let labels = vec![key.to_string()];
        let failure = if failed { 1.0 } else { 0.0 };
        // Both descriptors declare exactly one label.
        if let Ok(sample) = Sample::new(&self.call_duration, elapsed.as_secs_f64(), labels.clone()) {
            sink.emit(sample);
        }
        if let Ok(sample) = Sample::new(&self.call_failure, failure, labels) {
            sink.emit(sample);
        }
    }

    pub fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.call_duration), Arc::clone(&self.call_failure)]
    }
}

/// Shared, read-mostly state handed to collector factories.
#[derive(Clone)]
pub struct CollectorContext {
    /// Client handle for the cluster's stats engine.
    pub engine: Arc<dyn StatsEngine>,
    /// Process-wide cache of expensive identifiers.
    pub cache: Arc<ResultCache<u64>>,
    pub identity: ClusterIdentity,
    /// Per-call timeout; a timed-out call counts as a failure.
    pub query_timeout: Duration,
    pub meta: QueryMeta,
}

impl std::fmt::Debug for CollectorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorContext")
            .field("identity", &self.identity)
            .field("query_timeout", &self.query_timeout)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl CollectorContext {
    pub fn new(
        engine: Arc<dyn StatsEngine>,
        cache: Arc<ResultCache<u64>>,
        identity: ClusterIdentity,
        query_timeout: Duration,
    ) -> Self {
        let meta = QueryMeta::new(&identity.const_labels());
        Self {
            engine,
            cache,
            identity,
            query_timeout,
            meta,
        }
    }

    /// Constant labels for descriptors built in this context.
    pub fn const_labels(&self) -> ConstLabels {
        self.identity.const_labels()
    }

    /// Run one remote call under the query timeout without recording it.
    ///
    /// Callers that post-process the result record the meta-metrics once the
    /// final outcome of the key is known.
    pub async fn time_call<T, F>(&self, key: &str, call: F) -> (Result<T, StatsError>, Duration)
    where
        F: Future<Output = Result<T, StatsError>>,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.query_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StatsError::Timeout),
        };
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => tracing::debug!(key = %key, elapsed_ms = elapsed.as_millis(), "Stats query succeeded"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Error attempting to query stats engine"),
        }
        (result, elapsed)
    }

    /// Run one remote call under the query timeout and record its meta-metrics.
    ///
    /// The duration and failure samples are emitted whatever the outcome.
    pub async fn timed_call<T, F>(&self, sink: &SampleSink, key: &str, call: F) -> Result<T, StatsError>
    where
        F: Future<Output = Result<T, StatsError>>,
    {
        let (result, elapsed) = self.time_call(key, call).await;
        self.meta.record(sink, key, elapsed, result.is_err());
        result
    }
}
