//! Isilon Exporter Binary Entry Point
//!
//! Connects to one storage cluster and serves its statistics for
//! Prometheus. Core functionality is provided by the `isilon_exporter`
//! library crate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use isilon_exporter::{
    ClusterClient, ClusterIdentity, CollectorContext, CollectorRegistry, CollectorSelection,
    Exporter, ResultCache, StatsEngine,
    config::{AppConfig, parse_duration},
    server::{AppState, create_router},
};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Isilon Exporter - storage cluster metrics for Prometheus
#[derive(Parser, Debug)]
#[command(name = "isilon-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "ISILON_EXPORTER_CONFIG")]
    config: Option<String>,

    /// Cluster FQDN or IP address
    #[arg(long, env = "ISILON_CLUSTER_FQDN")]
    cluster_fqdn: Option<String>,

    /// Cluster platform API port
    #[arg(long, env = "ISILON_CLUSTER_PORT")]
    cluster_port: Option<u16>,

    /// Cluster username
    #[arg(long, env = "ISILON_CLUSTER_USERNAME")]
    cluster_username: Option<String>,

    /// Name of the environment variable holding the cluster password
    #[arg(long, env = "ISILON_CLUSTER_PASSWORD_ENV")]
    cluster_password_env: Option<String>,

    /// Site label attached to every metric
    #[arg(long, env = "ISILON_CLUSTER_SITE")]
    cluster_site: Option<String>,

    /// Server bind address (overrides config file)
    #[arg(long, env = "ISILON_EXPORTER_BIND")]
    bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "ISILON_EXPORTER_PORT")]
    port: Option<u16>,

    /// Default result cache expiration, in hours
    #[arg(long, env = "ISILON_EXPORTER_EXPIRATION")]
    expiration: Option<u64>,

    /// Timeout of each stats engine call (e.g. "30s")
    #[arg(long, env = "ISILON_EXPORTER_QUERY_TIMEOUT", value_parser = parse_duration)]
    query_timeout: Option<Duration>,

    /// Enable a collector (repeatable)
    #[arg(long = "collector", value_name = "NAME")]
    collectors: Vec<String>,

    /// Disable a collector (repeatable)
    #[arg(long = "no-collector", value_name = "NAME")]
    no_collectors: Vec<String>,

    /// Enable every registered collector
    #[arg(long)]
    collect_all: bool,
}

impl Cli {
    /// Apply CLI/env overrides (CLI > ENV > config file).
    fn apply(self, config: &mut AppConfig) {
        if let Some(fqdn) = self.cluster_fqdn {
            config.cluster.fqdn = fqdn;
        }
        if let Some(port) = self.cluster_port {
            config.cluster.port = port;
        }
        if let Some(username) = self.cluster_username {
            config.cluster.username = username;
        }
        if let Some(password_env) = self.cluster_password_env {
            config.cluster.password_env = password_env;
        }
        if let Some(site) = self.cluster_site {
            config.cluster.site = Some(site);
        }
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(hours) = self.expiration {
            config.cache.expiration_hours = hours;
        }
        if let Some(timeout) = self.query_timeout {
            config.scrape.query_timeout = timeout;
        }

        let selection = CollectorSelection {
            all: self.collect_all,
            enable: self.collectors,
            disable: self.no_collectors,
        };
        config.collectors = std::mem::take(&mut config.collectors).merge(selection);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,isilon_exporter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Isilon Exporter - storage cluster metrics for Prometheus");

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => {
            tracing::info!("Loading configuration from: {}", path);
            AppConfig::from_file(path)?
        }
        None => AppConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    tracing::info!(
        cluster = %config.cluster.fqdn,
        port = config.cluster.port,
        username = %config.cluster.username,
        "Connecting to cluster"
    );

    // Without a cluster identity no scrape can be served.
    let client = ClusterClient::connect(&config.cluster)?;
    let cluster_name = client.cluster_name().await?;
    let identity = ClusterIdentity::new(cluster_name, config.cluster.site.clone());
    tracing::info!(cluster = %identity.name, site = ?identity.site, "Cluster identified");

    let cache = Arc::new(ResultCache::new(config.cache.expiration()));
    let sweeper = cache.spawn_sweeper(config.cache.sweep_interval);

    let ctx = CollectorContext::new(
        Arc::new(client),
        Arc::clone(&cache),
        identity.clone(),
        config.scrape.query_timeout,
    );
    let collectors = CollectorRegistry::builtin().build_active(&config.collectors, &ctx)?;
    tracing::info!("Enabled {} collectors", collectors.len());

    let exporter = Arc::new(Exporter::new(collectors, identity));
    let app = create_router(
        AppState::new(exporter).with_metrics_path(config.server.metrics_path.clone()),
    );

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!(
        "Serving metrics on: http://{}{}",
        addr,
        config.server.metrics_path
    );
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweeper))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal(sweeper: JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Stopping cache sweeper...");
    sweeper.abort();
}
