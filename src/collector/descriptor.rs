//! Metric descriptors and samples.
//!
//! A [`MetricDescriptor`] is the immutable schema of one metric family; a
//! [`Sample`] is one gauge value recorded against it for the current scrape.

use std::collections::BTreeMap;
use std::sync::Arc;

use strum_macros::{AsRefStr, Display};

use crate::collector::CollectorError;

/// Metric namespace shared by every family this exporter produces.
pub const NAMESPACE: &str = "isilon";

/// Constant labels attached to every descriptor (e.g. `cluster`, `site`).
pub type ConstLabels = BTreeMap<String, String>;

/// Subsystem segment of a fully-qualified metric name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Subsystem {
    /// Cluster-wide filesystem, CPU and network figures.
    Ifs,
    /// Per-node figures.
    Node,
    /// Cluster-level datasets such as file system analytics.
    Cluster,
    /// The exporter's own behaviour.
    Exporter,
}

/// Build a fully-qualified metric name from its non-empty parts.
pub fn fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Immutable identity and schema of a metric family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    fq_name: String,
    help: String,
    variable_labels: Vec<String>,
    const_labels: ConstLabels,
}

impl MetricDescriptor {
    /// Create a descriptor under [`NAMESPACE`].
    pub fn new(
        subsystem: Subsystem,
        name: &str,
        help: impl Into<String>,
        variable_labels: &[&str],
        const_labels: ConstLabels,
    ) -> Self {
        Self {
            fq_name: fq_name(NAMESPACE, subsystem.as_ref(), name),
            help: help.into(),
            variable_labels: variable_labels.iter().map(|l| l.to_string()).collect(),
            const_labels,
        }
    }

    /// Fully-qualified name, e.g. `isilon_node_bytes_total`.
    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    /// Ordered variable label names.
    pub fn variable_labels(&self) -> &[String] {
        &self.variable_labels
    }

    pub fn const_labels(&self) -> &ConstLabels {
        &self.const_labels
    }
}

/// One gauge observation for the current scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    desc: Arc<MetricDescriptor>,
    value: f64,
    label_values: Vec<String>,
}

impl Sample {
    /// Build a sample, checking label arity against the descriptor.
    ///
    /// # Errors
    /// Returns `CollectorError::LabelArity` when the number of label values
    /// differs from the descriptor's variable label names.
    pub fn new(
        desc: &Arc<MetricDescriptor>,
        value: f64,
        label_values: Vec<String>,
    ) -> Result<Self, CollectorError> {
        if label_values.len() != desc.variable_labels.len() {
            return Err(CollectorError::LabelArity {
                metric: desc.fq_name.clone(),
                expected: desc.variable_labels.len(),
                actual: label_values.len(),
            });
        }
        Ok(Self {
            desc: Arc::clone(desc),
            value,
            label_values,
        })
    }

    pub fn desc(&self) -> &Arc<MetricDescriptor> {
        &self.desc
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Label value for `name`, if the descriptor declares it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .variable_labels
            .iter()
            .position(|l| l == name)
            .map(|i| self.label_values[i].as_str())
    }
}

/// Logical stat-to-metric mapping declared statically by a collector.
#[derive(Debug, Clone, Copy)]
pub struct StatSpec {
    /// Stat key requested from the stats engine.
    pub key: &'static str,
    /// Metric name within the collector's subsystem.
    pub metric: &'static str,
    pub help: &'static str,
}

impl StatSpec {
    pub const fn new(key: &'static str, metric: &'static str, help: &'static str) -> Self {
        Self { key, metric, help }
    }

    /// Materialize the descriptor for this mapping.
    pub fn describe(
        &self,
        subsystem: Subsystem,
        variable_labels: &[&str],
        const_labels: &ConstLabels,
    ) -> Arc<MetricDescriptor> {
        Arc::new(MetricDescriptor::new(
            subsystem,
            self.metric,
            self.help,
            variable_labels,
            const_labels.clone(),
        ))
    }
}
