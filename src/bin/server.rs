//! SA Exporter HTTP Server
//!
//! This binary exposes service availability gauges computed from the
//! Kubernetes endpoint counters stored in a Prometheus server.
//!
//! # Endpoints
//!
//! - `GET /metrics` - Run one aggregation cycle and return the exposition
//! - `GET /ready` - Readiness landing page
//! - `GET /health` - Health check
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `--config` or the `SA_EXPORTER_CONFIG` environment variable (path to TOML file)
//! 2. `./sa-exporter.toml` in current directory
//! 3. Default configuration
//!
//! Environment variables (a `.env` file is honored) override the file:
//! `PROM_ENDPOINT`, `PROMETHEUS_AUTH_USER`, `PROMETHEUS_AUTH_PWD`,
//! `SA_INTERACTIVE_AGGR`, `SA_BATCH_AGGR`.
//!
//! # Example
//!
//! ```bash
//! # Start server against a local Prometheus
//! PROM_ENDPOINT=localhost:9090 ./server --web.listen-address=:9800
//!
//! # Scrape
//! curl http://localhost:9800/metrics
//! ```

#[path = "server/handlers.rs"]
mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sa_exporter::{
    topology::{load_records, resolve_source_path},
    AvailabilityEngine, ExporterConfig, PrometheusClient, PrometheusConfig, PrometheusExporter,
    Topology,
};
use tokio::signal;
use tracing::info;

use handlers::{build_router, normalize_metrics_path, AppState};

// =============================================================================
// Command Line
// =============================================================================

/// Prometheus exporter for service availability
#[derive(Debug, Parser)]
#[command(name = "sa-exporter", version, about)]
struct Args {
    /// Address on which to expose metrics and web interface [default: :9800]
    #[arg(long = "web.listen-address")]
    listen_address: Option<String>,

    /// Path under which to expose metrics [default: /metrics]
    #[arg(long = "web.telemetry-path")]
    telemetry_path: Option<String>,

    /// Path to a TOML configuration file
    #[arg(long, env = "SA_EXPORTER_CONFIG")]
    config: Option<PathBuf>,
}

// =============================================================================
// Server Initialization
// =============================================================================

/// Load the service records and build the topology
fn init_topology(config: &ExporterConfig) -> Result<Topology, Box<dyn std::error::Error>> {
    let path = resolve_source_path(
        &config.topology.override_dir,
        &config.topology.default_file,
    );
    let records = load_records(&path)?;
    let topology = Topology::build(&records)?;
    Ok(topology)
}

/// Build the exporter on top of the Prometheus backend
fn init_exporter(
    config: &ExporterConfig,
    topology: Topology,
) -> Result<PrometheusExporter, Box<dyn std::error::Error>> {
    let client = PrometheusClient::new(&config.prometheus)?;
    info!(url = %client.query_url(), "Prometheus query endpoint");

    let engine = AvailabilityEngine::builder()
        .with_topology(topology)
        .with_backend(client)
        .with_windows(config.aggregation.clone())
        .with_liveness_check(
            config.prometheus.liveness_query.clone(),
            config.prometheus.dependency_name.clone(),
        )
        .build()?;
    info!(
        interactive = %engine.windows().interactive,
        batch = %engine.windows().batch,
        "Aggregation windows"
    );

    let exporter = PrometheusExporter::new(
        PrometheusConfig {
            include_self_metrics: config.include_self_metrics,
            ..Default::default()
        },
        Arc::new(engine),
    )?;
    Ok(exporter)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Before argument parsing so `env` defaults see the file
    let dotenv_path = dotenv::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sa_exporter=info".parse()?)
                .add_directive("server=info".parse()?),
        )
        .init();

    info!("SA Exporter starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    match &dotenv_path {
        Some(path) => info!(path = %path.display(), "Loaded .env file"),
        None => info!("No .env file found"),
    }

    // Load configuration
    let mut config = ExporterConfig::load(args.config.as_deref());
    config.apply_process_env();
    if let Some(listen_address) = args.listen_address {
        config.listen_addr = listen_address;
    }
    if let Some(telemetry_path) = args.telemetry_path {
        config.metrics_path = telemetry_path;
    }
    let metrics_path = normalize_metrics_path(&config.metrics_path)?;

    // Build topology and exporter
    let topology = init_topology(&config)?;
    let exporter = init_exporter(&config, topology)?;

    let state = Arc::new(AppState {
        exporter,
        metrics_path: metrics_path.clone(),
    });
    let app = build_router(state);

    let addr = config.socket_addr()?;
    info!(%addr, metrics_path = %metrics_path, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
