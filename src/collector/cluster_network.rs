//! Cluster-wide external network throughput and errors.

use std::sync::Arc;

use crate::collector::{
    Collector, CollectorContext, CollectorError, StatKeyCollector, StatSpec, Subsystem,
};

pub const NAME: &str = "cluster_network";

pub const STATS: &[StatSpec] = &[
    StatSpec::new("cluster.net.ext.bytes.in.rate", "net_ext_bytes_in_rate", "Cluster external network bytes in per second."),
    StatSpec::new("cluster.net.ext.bytes.out.rate", "net_ext_bytes_out_rate", "Cluster external network bytes out per second."),
    StatSpec::new("cluster.net.ext.errors.in.rate", "net_ext_errors_in_rate", "Cluster external network input errors per second."),
    StatSpec::new("cluster.net.ext.errors.out.rate", "net_ext_errors_out_rate", "Cluster external network output errors per second."),
];

pub fn build(ctx: &CollectorContext) -> Result<Arc<dyn Collector>, CollectorError> {
    Ok(Arc::new(StatKeyCollector::new(NAME, Subsystem::Ifs, &[], STATS, ctx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResultCache;
    use crate::collector::{ClusterIdentity, DEFAULT_QUERY_TIMEOUT};
    use crate::stats::MockStatsEngine;

    #[test]
    fn test_network_descriptors() {
        let ctx = CollectorContext::new(
            Arc::new(MockStatsEngine::new("c1")),
            Arc::new(ResultCache::default()),
            ClusterIdentity::new("c1", Some("ams".to_string())),
            DEFAULT_QUERY_TIMEOUT,
        );
        let collector = build(&ctx).unwrap();
        let names: Vec<String> = collector
            .descriptors()
            .iter()
            .map(|d| d.fq_name().to_string())
            .collect();

        assert!(names.contains(&"isilon_ifs_net_ext_bytes_in_rate".to_string()));
        assert!(names.contains(&"isilon_ifs_net_ext_errors_out_rate".to_string()));
        assert!(
            collector
                .descriptors()
                .iter()
                .all(|d| d.const_labels().get("site") == Some(&"ams".to_string()))
        );
    }
}
