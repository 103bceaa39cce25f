//! Generic collector over a fixed set of stat keys.
//!
//! Every built-in collector except FSA is a static table of
//! `key -> metric` mappings queried the same way, so they share this
//! implementation and differ only in their table and label layout.

use std::sync::Arc;

use futures::future::join_all;

use crate::collector::convert::fan_out;
use crate::collector::{
    Collector, CollectorContext, CollectorError, MetricDescriptor, SampleSink, StatSpec, Subsystem,
};

/// One resolved `stat key -> descriptor` mapping.
#[derive(Debug, Clone)]
struct StatMapping {
    key: &'static str,
    desc: Arc<MetricDescriptor>,
}

/// Collector that queries each configured stat key once per update.
pub struct StatKeyCollector {
    name: &'static str,
    mappings: Vec<StatMapping>,
    ctx: CollectorContext,
}

impl std::fmt::Debug for StatKeyCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatKeyCollector")
            .field("name", &self.name)
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

impl StatKeyCollector {
    /// Build descriptors for `specs` under `subsystem`.
    pub fn new(
        name: &'static str,
        subsystem: Subsystem,
        variable_labels: &[&str],
        specs: &[StatSpec],
        ctx: &CollectorContext,
    ) -> Self {
        let const_labels = ctx.const_labels();
        let mappings = specs
            .iter()
            .map(|spec| StatMapping {
                key: spec.key,
                desc: spec.describe(subsystem, variable_labels, &const_labels),
            })
            .collect();

        Self {
            name,
            mappings,
            ctx: ctx.clone(),
        }
    }

    /// Stat keys queried by this collector, in table order.
    pub fn keys(&self) -> Vec<&'static str> {
        self.mappings.iter().map(|m| m.key).collect()
    }

    /// Query one key, emit its meta-metrics and, on success, its samples.
    ///
    /// A key fails when the query or the conversion fails; the failure
    /// meta-metric reports the same outcome. Returns `true` when the key failed.
    async fn collect_key(&self, mapping: &StatMapping, sink: &SampleSink) -> bool {
        let (result, elapsed) = self
            .ctx
            .time_call(mapping.key, self.ctx.engine.query(mapping.key))
            .await;

        let samples = match result {
            Ok(stats) => match fan_out(&mapping.desc, mapping.key, &stats) {
                Ok(samples) => Some(samples),
                Err(e) => {
                    tracing::warn!(collector = %self.name, key = %mapping.key, error = %e, "Could not build samples");
                    None
                }
            },
            Err(_) => None,
        };

        self.ctx.meta.record(sink, mapping.key, elapsed, samples.is_none());
        match samples {
            Some(samples) => {
                for sample in samples {
                    sink.emit(sample);
                }
                false
            }
            None => true,
        }
    }
}

#[async_trait::async_trait]
impl Collector for StatKeyCollector {
    fn name(&self) -> &str {
        self.name
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        let mut descs: Vec<_> = self.mappings.iter().map(|m| Arc::clone(&m.desc)).collect();
        descs.extend(self.ctx.meta.descriptors());
        descs
    }

    async fn update(&self, sink: &SampleSink) -> Result<(), CollectorError> {
        let outcomes = join_all(self.mappings.iter().map(|m| self.collect_key(m, sink))).await;
        let failed = outcomes.into_iter().filter(|failed| *failed).count();

        if failed > 0 {
            return Err(CollectorError::Failures { failed });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::ResultCache;
    use crate::collector::sink::drain;
    use crate::collector::{ClusterIdentity, DEFAULT_QUERY_TIMEOUT};
    use crate::stats::{MockStatsEngine, StatValue};

    const SPECS: &[StatSpec] = &[
        StatSpec::new("k.one", "one", "First."),
        StatSpec::new("k.two", "two", "Second."),
        StatSpec::new("k.three", "three", "Third."),
    ];

    fn collector(engine: MockStatsEngine, timeout: Duration) -> StatKeyCollector {
        let ctx = CollectorContext::new(
            Arc::new(engine),
            Arc::new(ResultCache::default()),
            ClusterIdentity::new("c1", None),
            timeout,
        );
        StatKeyCollector::new("test", Subsystem::Ifs, &[], SPECS, &ctx)
    }

    fn count_named(samples: &[crate::collector::Sample], name: &str) -> usize {
        samples.iter().filter(|s| s.desc().fq_name() == name).count()
    }

    #[tokio::test]
    async fn test_all_keys_succeed() {
        let engine = MockStatsEngine::new("c1")
            .with_value("k.one", 1.0)
            .with_value("k.two", 2.0)
            .with_value("k.three", 3.0);
        let collector = collector(engine, DEFAULT_QUERY_TIMEOUT);
        let (sink, mut rx) = SampleSink::channel();

        collector.update(&sink).await.unwrap();
        let samples = drain(&mut rx);

        assert_eq!(count_named(&samples, "isilon_exporter_stats_engine_call_duration_seconds"), 3);
        assert_eq!(count_named(&samples, "isilon_exporter_stats_engine_call_failure"), 3);
        assert_eq!(count_named(&samples, "isilon_ifs_two"), 1);
        assert_eq!(samples.len(), 9);
    }

    #[tokio::test]
    async fn test_partial_failure_continues() {
        let engine = MockStatsEngine::new("c1")
            .with_value("k.one", 1.0)
            .with_failure("k.two")
            .with_value("k.three", 3.0);
        let collector = collector(engine, DEFAULT_QUERY_TIMEOUT);
        let (sink, mut rx) = SampleSink::channel();

        let err = collector.update(&sink).await.unwrap_err();
        assert!(matches!(err, CollectorError::Failures { failed: 1 }));

        let samples = drain(&mut rx);
        assert_eq!(count_named(&samples, "isilon_exporter_stats_engine_call_failure"), 3);
        assert_eq!(count_named(&samples, "isilon_ifs_one"), 1);
        assert_eq!(count_named(&samples, "isilon_ifs_two"), 0);
        assert_eq!(count_named(&samples, "isilon_ifs_three"), 1);

        let failed: Vec<_> = samples
            .iter()
            .filter(|s| s.desc().fq_name() == "isilon_exporter_stats_engine_call_failure")
            .filter(|s| s.value() == 1.0)
            .map(|s| s.label("key").unwrap_or_default().to_string())
            .collect();
        assert_eq!(failed, vec!["k.two".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_key_counts_as_failure() {
        let engine = MockStatsEngine::new("c1").with_value("k.one", 1.0);
        let collector = collector(engine, DEFAULT_QUERY_TIMEOUT);
        let (sink, _rx) = SampleSink::channel();

        let err = collector.update(&sink).await.unwrap_err();
        assert!(matches!(err, CollectorError::Failures { failed: 2 }));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let engine = MockStatsEngine::new("c1")
            .with_value("k.one", 1.0)
            .with_value("k.two", 2.0)
            .with_delay("k.two", Duration::from_millis(300))
            .with_value("k.three", 3.0);
        let collector = collector(engine, Duration::from_millis(50));
        let (sink, mut rx) = SampleSink::channel();

        let err = collector.update(&sink).await.unwrap_err();
        assert!(matches!(err, CollectorError::Failures { failed: 1 }));
        let samples = drain(&mut rx);
        assert_eq!(count_named(&samples, "isilon_ifs_two"), 0);
    }

    #[tokio::test]
    async fn test_failure_flags_match_error_count() {
        let engine = MockStatsEngine::new("c1")
            .with_failure("k.one")
            .with_value("k.two", 2.0)
            .with_delay("k.two", Duration::from_millis(300));
        let collector = collector(engine, Duration::from_millis(50));
        let (sink, mut rx) = SampleSink::channel();

        let err = collector.update(&sink).await.unwrap_err();
        let CollectorError::Failures { failed } = err else {
            panic!("unexpected error: {err}");
        };
        let flagged = drain(&mut rx)
            .iter()
            .filter(|s| s.desc().fq_name() == "isilon_exporter_stats_engine_call_failure")
            .filter(|s| s.value() == 1.0)
            .count();
        assert_eq!(failed, 3);
        assert_eq!(flagged, failed);
    }

    #[tokio::test]
    async fn test_empty_result_emits_only_meta() {
        let engine = MockStatsEngine::new("c1")
            .with_stat("k.one", vec![])
            .with_value("k.two", 2.0)
            .with_stat("k.three", vec![StatValue::new(3.0)]);
        let collector = collector(engine, DEFAULT_QUERY_TIMEOUT);
        let (sink, mut rx) = SampleSink::channel();

        collector.update(&sink).await.unwrap();
        let samples = drain(&mut rx);
        assert_eq!(count_named(&samples, "isilon_ifs_one"), 0);
        assert_eq!(samples.len(), 8);
    }

    #[test]
    fn test_descriptors_include_meta() {
        let collector = collector(MockStatsEngine::new("c1"), DEFAULT_QUERY_TIMEOUT);
        assert_eq!(collector.descriptors().len(), SPECS.len() + 2);
        assert_eq!(collector.keys(), vec!["k.one", "k.two", "k.three"]);
    }
}
