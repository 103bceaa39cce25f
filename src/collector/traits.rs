//! Core collector trait and error type.

use std::sync::Arc;

use thiserror::Error;

use crate::collector::{MetricDescriptor, SampleSink};
use crate::stats::StatsError;

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// A single remote call failed.
    #[error("stats engine error: {0}")]
    Stats(#[from] StatsError),

    /// One or more stat keys failed during an update.
    ///
    /// Only the count is kept; the failing keys are visible through the
    /// per-key failure meta-metric.
    #[error("there were {failed} errors")]
    Failures { failed: usize },

    /// A sample was built with the wrong number of label values.
    #[error("metric '{metric}' expected {expected} label values, got {actual}")]
    LabelArity {
        metric: String,
        expected: usize,
        actual: usize,
    },

    /// Invalid collector selection or construction input.
    #[error("config error: {0}")]
    Config(String),
}

/// A unit of collection work.
///
/// Collectors are built once at startup and reused for every scrape. They
/// hold no per-scrape state; anything shared across scrapes lives in the
/// result cache or the cluster client passed in at construction.
///
/// # Error Handling Philosophy
///
/// A failing stat key is an observation, not an abort: `update` records the
/// failure through the per-key meta-metrics, keeps going with the remaining
/// keys and only then reports the aggregate:
///
/// - `Ok(())`: every key succeeded
/// - `Err(CollectorError::Failures { failed })`: `failed` keys could not be queried
///
/// A prerequisite call that fails (e.g. the FSA result-set lookup) counts as
/// one failed key and ends the update early.
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Registry name (e.g. `node_capacity`).
    fn name(&self) -> &str;

    /// Every descriptor this collector can emit samples for.
    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>>;

    /// Perform one collection pass, emitting samples into `sink`.
    async fn update(&self, sink: &SampleSink) -> Result<(), CollectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_message_carries_count_only() {
        let err = CollectorError::Failures { failed: 3 };
        assert_eq!(err.to_string(), "there were 3 errors");
    }

    #[test]
    fn test_stats_error_converts() {
        let err: CollectorError = StatsError::Timeout.into();
        assert!(matches!(err, CollectorError::Stats(StatsError::Timeout)));
        assert!(err.to_string().contains("timeout"));
    }
}
