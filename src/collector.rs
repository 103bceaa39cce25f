//! Collector Layer
//!
//! Collectors query the cluster's stats engine and turn the answers into
//! gauge samples. They are built once at startup and invoked on every
//! scrape, writing into a shared [`SampleSink`].
//!
//! # Architecture
//!
//! - [`Collector`]: core trait (`update` per scrape)
//! - [`MetricDescriptor`] / [`Sample`]: metric schema and observations
//! - [`CollectorContext`]: shared engine handle, result cache and cluster identity
//! - [`StatKeyCollector`]: generic query/convert/emit loop over a stat-key table
//! - [`CollectorRegistry`]: named factories and startup resolution of the active set
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use isilon_exporter::{
//!     ClusterIdentity, CollectorContext, CollectorRegistry, CollectorSelection,
//!     MockStatsEngine, ResultCache,
//! };
//! use isilon_exporter::collector::DEFAULT_QUERY_TIMEOUT;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = CollectorContext::new(
//!     Arc::new(MockStatsEngine::new("lab")),
//!     Arc::new(ResultCache::default()),
//!     ClusterIdentity::new("lab", None),
//!     DEFAULT_QUERY_TIMEOUT,
//! );
//! let collectors = CollectorRegistry::builtin()
//!     .build_active(&CollectorSelection::default(), &ctx)?;
//! # Ok(())
//! # }
//! ```

pub mod cluster_cpu;
pub mod cluster_network;
mod context;
pub mod convert;
mod descriptor;
pub mod fsa;
pub mod node_capacity;
mod registry;
pub mod sink;
mod stat_query;
mod traits;

pub use context::{ClusterIdentity, CollectorContext, DEFAULT_QUERY_TIMEOUT, QueryMeta};
pub use descriptor::{ConstLabels, MetricDescriptor, NAMESPACE, Sample, StatSpec, Subsystem, fq_name};
pub use registry::{CollectorFactory, CollectorRegistry, Registration};
pub use sink::SampleSink;
pub use stat_query::StatKeyCollector;
pub use traits::{Collector, CollectorError};
