//! Per-node filesystem capacity and throughput.

use std::sync::Arc;

use crate::collector::{
    Collector, CollectorContext, CollectorError, StatKeyCollector, StatSpec, Subsystem,
};

pub const NAME: &str = "node_capacity";

/// Variable label filled with each row's device id.
pub const NODE_LABEL: &str = "node";

pub const STATS: &[StatSpec] = &[
    StatSpec::new("node.ifs.bytes.total", "bytes_total", "Total filesystem capacity of the node in bytes."),
    StatSpec::new("node.ifs.bytes.used", "bytes_used", "Used filesystem capacity of the node in bytes."),
    StatSpec::new("node.ifs.bytes.free", "bytes_free", "Free filesystem capacity of the node in bytes."),
    StatSpec::new("node.ifs.bytes.in.rate", "bytes_in_rate", "Filesystem bytes written to the node per second."),
    StatSpec::new("node.ifs.bytes.out.rate", "bytes_out_rate", "Filesystem bytes read from the node per second."),
];

pub fn build(ctx: &CollectorContext) -> Result<Arc<dyn Collector>, CollectorError> {
    Ok(Arc::new(StatKeyCollector::new(
        NAME,
        Subsystem::Node,
        &[NODE_LABEL],
        STATS,
        ctx,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResultCache;
    use crate::collector::sink::drain;
    use crate::collector::{ClusterIdentity, DEFAULT_QUERY_TIMEOUT, SampleSink};
    use crate::stats::{MockStatsEngine, StatValue};

    fn per_node(base: f64) -> Vec<StatValue> {
        (1..=3).map(|devid| StatValue::for_node(devid, base * devid as f64)).collect()
    }

    #[tokio::test]
    async fn test_one_sample_per_node() {
        let engine = STATS
            .iter()
            .fold(MockStatsEngine::new("c1"), |engine, spec| {
                engine.with_stat(spec.key, per_node(100.0))
            });
        let ctx = CollectorContext::new(
            Arc::new(engine),
            Arc::new(ResultCache::default()),
            ClusterIdentity::new("c1", None),
            DEFAULT_QUERY_TIMEOUT,
        );
        let collector = build(&ctx).unwrap();
        let (sink, mut rx) = SampleSink::channel();

        collector.update(&sink).await.unwrap();
        let samples = drain(&mut rx);

        let mut totals: Vec<_> = samples
            .iter()
            .filter(|s| s.desc().fq_name() == "isilon_node_bytes_total")
            .map(|s| (s.label(NODE_LABEL).unwrap_or_default().to_string(), s.value()))
            .collect();
        totals.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            totals,
            vec![
                ("1".to_string(), 100.0),
                ("2".to_string(), 200.0),
                ("3".to_string(), 300.0),
            ]
        );
        // 5 keys x (3 values + 2 meta)
        assert_eq!(samples.len(), 25);
    }
}
