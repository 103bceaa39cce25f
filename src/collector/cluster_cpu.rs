//! Cluster-wide CPU utilisation.

use std::sync::Arc;

use crate::collector::{
    Collector, CollectorContext, CollectorError, StatKeyCollector, StatSpec, Subsystem,
};

pub const NAME: &str = "cluster_cpu";

/// CPU ratios arrive in tenths of a percent; see `convert`.
pub const STATS: &[StatSpec] = &[
    StatSpec::new("cluster.cpu.count", "cpu_count", "Number of CPUs in the cluster."),
    StatSpec::new("cluster.cpu.idle.avg", "cpu_idle_avg", "Average CPU idle percentage across the cluster."),
    StatSpec::new("cluster.cpu.user.avg", "cpu_user_avg", "Average CPU user percentage across the cluster."),
    StatSpec::new("cluster.cpu.sys.avg", "cpu_sys_avg", "Average CPU system percentage across the cluster."),
];

pub fn build(ctx: &CollectorContext) -> Result<Arc<dyn Collector>, CollectorError> {
    Ok(Arc::new(StatKeyCollector::new(NAME, Subsystem::Ifs, &[], STATS, ctx)))
}
