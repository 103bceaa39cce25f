//! Isilon Exporter - storage cluster metrics for Prometheus
//!
//! This crate polls a storage cluster's statistics engine on every scrape
//! and exposes the answers as Prometheus gauges. It can be embedded as a
//! library, or run as a standalone binary with the `isilon-exporter`
//! executable.
//!
//! # Architecture
//!
//! - **Stats engine**: query interface to the cluster ([`StatsEngine`]), with an
//!   HTTPS client ([`ClusterClient`]) and an in-memory mock ([`MockStatsEngine`])
//! - **Result cache**: time-bounded store for expensive lookups ([`ResultCache`])
//! - **Collectors**: named units that query, convert and emit samples ([`Collector`])
//! - **Scrape orchestration**: runs the active collectors once per request ([`Exporter`])
//! - **Exposition**: Prometheus text rendering and the HTTP surface
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use isilon_exporter::{
//!     ClusterIdentity, CollectorContext, CollectorRegistry, CollectorSelection, Exporter,
//!     MockStatsEngine, ResultCache, encode_text,
//! };
//! use isilon_exporter::collector::DEFAULT_QUERY_TIMEOUT;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let identity = ClusterIdentity::new("lab", None);
//!     let ctx = CollectorContext::new(
//!         Arc::new(MockStatsEngine::new("lab").with_value("cluster.cpu.count", 24.0)),
//!         Arc::new(ResultCache::default()),
//!         identity.clone(),
//!         DEFAULT_QUERY_TIMEOUT,
//!     );
//!     let collectors = CollectorRegistry::builtin()
//!         .build_active(&CollectorSelection::default(), &ctx)?;
//!
//!     let exporter = Exporter::new(collectors, identity);
//!     let report = exporter.scrape().await;
//!     println!("{}", encode_text(&report)?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod collector;
pub mod config;
pub mod exposition;
pub mod scrape;
pub mod server;
pub mod stats;

pub use cache::ResultCache;
pub use client::ClusterClient;
pub use collector::{
    ClusterIdentity, Collector, CollectorContext, CollectorError, CollectorRegistry,
    MetricDescriptor, Sample, SampleSink,
};
pub use config::{AppConfig, CollectorSelection, ConfigError};
pub use exposition::{ExpositionError, encode_text};
pub use scrape::{CollectorOutcome, Exporter, ScrapeReport, ScrapeSummary};
pub use stats::{MockStatsEngine, StatValue, StatsEngine, StatsError};
