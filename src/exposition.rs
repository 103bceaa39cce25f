//! Prometheus text exposition of a scrape.
//!
//! Each scrape is rendered through a fresh `prometheus::Registry`, so nothing
//! outlives the request. Samples are grouped into one gauge family per
//! descriptor; a repeated label set within a family keeps the last value.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::collector::{MetricDescriptor, Sample};
use crate::scrape::ScrapeReport;

/// Errors raised while rendering a scrape.
#[derive(Debug, Error)]
pub enum ExpositionError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("encoded output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Content type of the text exposition format.
pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

fn gauge_vec(desc: &MetricDescriptor) -> Result<GaugeVec, ExpositionError> {
    let const_labels: HashMap<String, String> = desc
        .const_labels()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let opts = Opts::new(desc.fq_name(), desc.help()).const_labels(const_labels);
    let labels: Vec<&str> = desc.variable_labels().iter().map(String::as_str).collect();
    Ok(GaugeVec::new(opts, &labels)?)
}

/// Build a registry holding every sample of `report`.
pub fn registry_for(report: &ScrapeReport) -> Result<Registry, ExpositionError> {
    let mut families: BTreeMap<&str, (Arc<MetricDescriptor>, Vec<&Sample>)> = BTreeMap::new();
    for sample in &report.samples {
        families
            .entry(sample.desc().fq_name())
            .or_insert_with(|| (Arc::clone(sample.desc()), Vec::new()))
            .1
            .push(sample);
    }

    let registry = Registry::new();
    for (desc, samples) in families.values() {
        let gauges = gauge_vec(desc)?;
        for sample in samples {
            let values: Vec<&str> = sample.label_values().iter().map(String::as_str).collect();
            gauges.get_metric_with_label_values(&values)?.set(sample.value());
        }
        registry.register(Box::new(gauges))?;
    }
    Ok(registry)
}

/// Render `report` in the Prometheus text format.
pub fn encode_text(report: &ScrapeReport) -> Result<String, ExpositionError> {
    let registry = registry_for(report)?;
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
