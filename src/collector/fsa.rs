//! File system analytics (FSA) directory usage.
//!
//! FSA result sets are produced by a cluster job that runs at most a few
//! times a day, and finding the latest one is an expensive listing. The
//! latest result-set id is therefore kept in the shared result cache under
//! [`RESULT_ID_CACHE_KEY`]; only the directory dataset is fetched on every
//! scrape.

use std::sync::Arc;

use crate::collector::{
    Collector, CollectorContext, CollectorError, MetricDescriptor, Sample, SampleSink, Subsystem,
};
use crate::stats::FsaUsage;

pub const NAME: &str = "fsa";

/// Cache key of the latest FSA result-set id.
pub const RESULT_ID_CACHE_KEY: &str = "rsid";

/// Meta-metric key of the result-set listing call.
pub const RESULTS_CALL: &str = "fsa.results";
/// Meta-metric key of the directory dataset call.
pub const DIRECTORIES_CALL: &str = "fsa.directories";

const LABELS: &[&str] = &["name", "lin", "parent"];

type Extract = fn(&FsaUsage) -> f64;

const FAMILIES: &[(&str, &str, Extract)] = &[
    ("fsa_ads_count", "Number of alternate data streams.", |u| u.ads_cnt),
    ("fsa_dir_count", "Number of directories.", |u| u.dir_cnt),
    ("fsa_file_count", "Number of files.", |u| u.file_cnt),
    ("fsa_log_size_sum", "Logical size of the directory tree in bytes.", |u| u.log_size_sum),
    (
        "fsa_log_size_sum_overflow",
        "Logical size overflow of the directory tree in bytes.",
        |u| u.log_size_sum_overflow,
    ),
    ("fsa_other_count", "Number of other file system objects.", |u| u.other_cnt),
    ("fsa_phys_size_sum", "Physical size of the directory tree in bytes.", |u| u.phys_size_sum),
];

/// Collector for the directory usage rows of the latest FSA result set.
pub struct FsaCollector {
    families: Vec<(Arc<MetricDescriptor>, Extract)>,
    ctx: CollectorContext,
}

impl std::fmt::Debug for FsaCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsaCollector")
            .field("families", &self.families.len())
            .finish_non_exhaustive()
    }
}

impl FsaCollector {
    pub fn new(ctx: &CollectorContext) -> Self {
        let const_labels = ctx.const_labels();
        let families = FAMILIES
            .iter()
            .map(|(name, help, extract)| {
                let desc = MetricDescriptor::new(
                    Subsystem::Cluster,
                    name,
                    *help,
                    LABELS,
                    const_labels.clone(),
                );
                (Arc::new(desc), *extract)
            })
            .collect();

        Self {
            families,
            ctx: ctx.clone(),
        }
    }

    /// Latest result-set id, from the cache when live.
    ///
    /// A failed lookup writes nothing, so the next scrape retries.
    async fn result_id(&self, sink: &SampleSink) -> Result<u64, CollectorError> {
        let ttl = self.ctx.cache.default_ttl();
        let (result_id, hit) = self
            .ctx
            .cache
            .get_or_try_fetch(RESULT_ID_CACHE_KEY, ttl, || {
                self.ctx
                    .timed_call(sink, RESULTS_CALL, self.ctx.engine.latest_fsa_result_id())
            })
            .await?;

        if !hit {
            tracing::debug!(result_id, "Cached latest FSA result set id");
        }
        Ok(result_id)
    }

    fn emit_row(&self, sink: &SampleSink, row: &FsaUsage) -> Result<(), CollectorError> {
        let labels = vec![row.name.clone(), row.lin.to_string(), row.parent.to_string()];
        for (desc, extract) in &self.families {
            sink.emit(Sample::new(desc, extract(row), labels.clone())?);
        }
        Ok(())
    }
}

pub fn build(ctx: &CollectorContext) -> Result<Arc<dyn Collector>, CollectorError> {
    Ok(Arc::new(FsaCollector::new(ctx)))
}

#[async_trait::async_trait]
impl Collector for FsaCollector {
    fn name(&self) -> &str {
        NAME
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        let mut descs: Vec<_> = self.families.iter().map(|(d, _)| Arc::clone(d)).collect();
        descs.extend(self.ctx.meta.descriptors());
        descs
    }

    async fn update(&self, sink: &SampleSink) -> Result<(), CollectorError> {
        let result_id = match self.result_id(sink).await {
            Ok(id) => id,
            Err(_) => return Err(CollectorError::Failures { failed: 1 }),
        };

        let directories = match self
            .ctx
            .timed_call(sink, DIRECTORIES_CALL, self.ctx.engine.fsa_directories(result_id))
            .await
        {
            Ok(directories) => directories,
            Err(_) => {
                // The cached id may point at a deleted result set.
                self.ctx.cache.remove(RESULT_ID_CACHE_KEY);
                return Err(CollectorError::Failures { failed: 1 });
            }
        };

        self.emit_row(sink, &directories.total_usage)?;
        for row in &directories.usage_data {
            self.emit_row(sink, row)?;
        }
        Ok(())
    }
}
