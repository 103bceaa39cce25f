//! Scrape orchestration.
//!
//! One scrape runs every active collector concurrently, gathers their
//! samples and records per-collector and overall outcome meta-metrics.
//! Collectors never abort each other: a failed collector only degrades
//! its own section and flips the overall success gauge.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;

use crate::collector::sink::drain;
use crate::collector::{
    ClusterIdentity, Collector, ConstLabels, MetricDescriptor, Sample, SampleSink, Subsystem,
};

/// Descriptors of the orchestrator's own meta-metrics.
#[derive(Debug, Clone)]
struct ScrapeMeta {
    collector_duration: Arc<MetricDescriptor>,
    collector_success: Arc<MetricDescriptor>,
    scrape_success: Arc<MetricDescriptor>,
    scrape_duration: Arc<MetricDescriptor>,
}

impl ScrapeMeta {
    fn new(const_labels: &ConstLabels) -> Self {
        let desc = |name: &str, help: &str, labels: &[&str]| {
            Arc::new(MetricDescriptor::new(
                Subsystem::Exporter,
                name,
                help,
                labels,
                const_labels.clone(),
            ))
        };
        Self {
            collector_duration: desc(
                "collector_duration_seconds",
                "Duration of a collector update, in seconds.",
                &["collector"],
            ),
            collector_success: desc(
                "collector_success",
                "Whether a collector update succeeded (1) or not (0).",
                &["collector"],
            ),
            scrape_success: desc(
                "scrape_success",
                "Whether every collector succeeded during the last scrape.",
                &[],
            ),
            scrape_duration: desc(
                "scrape_duration_seconds",
                "Duration of the last scrape, in seconds.",
                &[],
            ),
        }
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![
            Arc::clone(&self.collector_duration),
            Arc::clone(&self.collector_success),
            Arc::clone(&self.scrape_success),
            Arc::clone(&self.scrape_duration),
        ]
    }
}

/// Result of one collector during one scrape.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorOutcome {
    pub name: String,
    /// Aggregate error message, absent on success.
    pub error: Option<String>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Samples emitted by the collector, meta-metrics included.
    pub samples: u64,
}

impl CollectorOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything produced by one scrape.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// Samples in no particular order.
    pub samples: Vec<Sample>,
    pub outcomes: Vec<CollectorOutcome>,
}

impl ScrapeReport {
    /// Whether every collector succeeded.
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(CollectorOutcome::success)
    }

    /// Samples recorded against the metric family `fq_name`.
    pub fn samples_named<'a>(&'a self, fq_name: &'a str) -> impl Iterator<Item = &'a Sample> + 'a {
        self.samples.iter().filter(move |s| s.desc().fq_name() == fq_name)
    }
}

/// JSON view of a [`ScrapeReport`], without the samples themselves.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSummary {
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub success: bool,
    pub samples: usize,
    pub collectors: Vec<CollectorOutcome>,
}

impl From<&ScrapeReport> for ScrapeSummary {
    fn from(report: &ScrapeReport) -> Self {
        Self {
            started_at: report.started_at,
            duration: report.duration,
            success: report.success(),
            samples: report.samples.len(),
            collectors: report.outcomes.clone(),
        }
    }
}

/// Scrape orchestrator over a fixed set of collectors.
pub struct Exporter {
    collectors: Vec<Arc<dyn Collector>>,
    identity: ClusterIdentity,
    meta: ScrapeMeta,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("collectors", &self.collector_names())
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Exporter {
    pub fn new(collectors: Vec<Arc<dyn Collector>>, identity: ClusterIdentity) -> Self {
        let meta = ScrapeMeta::new(&identity.const_labels());
        Self {
            collectors,
            identity,
            meta,
        }
    }

    pub fn identity(&self) -> &ClusterIdentity {
        &self.identity
    }

    pub fn collector_names(&self) -> Vec<String> {
        self.collectors.iter().map(|c| c.name().to_string()).collect()
    }

    /// Every descriptor that a scrape can produce samples for.
    pub fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        let mut descs: Vec<Arc<MetricDescriptor>> = Vec::new();
        for desc in self
            .collectors
            .iter()
            .flat_map(|c| c.descriptors())
            .chain(self.meta.descriptors())
        {
            if !descs.iter().any(|d| d.fq_name() == desc.fq_name()) {
                descs.push(desc);
            }
        }
        descs
    }

    /// Run every collector once and gather the results.
    pub async fn scrape(&self) -> ScrapeReport {
        let started_at = Utc::now();
        let start = Instant::now();

        let runs = join_all(self.collectors.iter().map(|c| run_collector(c.as_ref()))).await;

        let (sink, mut rx) = SampleSink::channel();
        let mut samples = Vec::new();
        let mut outcomes = Vec::with_capacity(runs.len());
        for (outcome, collected) in runs {
            self.emit(&sink, &self.meta.collector_duration, outcome.duration.as_secs_f64(), &outcome.name);
            self.emit(&sink, &self.meta.collector_success, gauge_bool(outcome.success()), &outcome.name);
            samples.extend(collected);
            outcomes.push(outcome);
        }

        let success = outcomes.iter().all(CollectorOutcome::success);
        let duration = start.elapsed();
        self.emit_unlabeled(&sink, &self.meta.scrape_success, gauge_bool(success));
        self.emit_unlabeled(&sink, &self.meta.scrape_duration, duration.as_secs_f64());
        samples.extend(drain(&mut rx));

        tracing::debug!(
            collectors = outcomes.len(),
            samples = samples.len(),
            success,
            elapsed_ms = duration.as_millis(),
            "Scrape complete"
        );

        ScrapeReport {
            started_at,
            duration,
            samples,
            outcomes,
        }
    }

    fn emit(&self, sink: &SampleSink, desc: &Arc<MetricDescriptor>, value: f64, collector: &str) {
        if let Ok(sample) = Sample::new(desc, value, vec![collector.to_string()]) {
            sink.emit(sample);
        }
    }

    fn emit_unlabeled(&self, sink: &SampleSink, desc: &Arc<MetricDescriptor>, value: f64) {
        if let Ok(sample) = Sample::new(desc, value, Vec::new()) {
            sink.emit(sample);
        }
    }
}

fn gauge_bool(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Run one collector into its own sink so its sample count stays separate.
async fn run_collector(collector: &dyn Collector) -> (CollectorOutcome, Vec<Sample>) {
    let (sink, mut rx) = SampleSink::channel();
    let start = Instant::now();
    let result = collector.update(&sink).await;
    let duration = start.elapsed();

    let error = match result {
        Ok(()) => {
            tracing::debug!(collector = %collector.name(), elapsed_ms = duration.as_millis(), "Collector succeeded");
            None
        }
        Err(e) => {
            tracing::error!(collector = %collector.name(), error = %e, "Collector failed");
            Some(e.to_string())
        }
    };

    let outcome = CollectorOutcome {
        name: collector.name().to_string(),
        error,
        duration,
        samples: sink.emitted(),
    };
    (outcome, drain(&mut rx))
}
