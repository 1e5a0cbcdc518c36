//! vri-ai - Venue Review Intelligence service
//!
//! Classifies review sentiment, clusters reviews over an induced category
//! vocabulary and writes a structured summary per venue.
//!
//! Runs as an HTTP service (`POST /pipeline/run`) or, with `--once`, executes
//! a single pass and prints the run report as JSON.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use vri_ai::db::SqliteDocumentStore;
use vri_ai::models::PipelineRun;
use vri_ai::services::{PipelineOrchestrator, ServiceRegistry};
use vri_ai::AppState;
use vri_common::config::{load_toml_config, resolve_api_token, resolve_config_path};

/// Command-line arguments for vri-ai
#[derive(Parser, Debug)]
#[command(name = "vri-ai")]
#[command(about = "Venue review intelligence pipeline")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file (falls back to VRI_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the configuration file)
    #[arg(short, long, env = "VRI_PORT")]
    port: Option<u16>,

    /// Run one full pass, print the report and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise start at info and switch to the configured
    // level once the configuration is loaded
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| default_filter("info")),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vri-ai (Venue Review Intelligence)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = resolve_config_path(args.config.as_deref());
    let config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    if !from_env {
        apply_log_level(&filter_handle, &config.logging.level);
    }

    info!("Database: {}", config.database_path.display());
    let pool = vri_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let store = Arc::new(SqliteDocumentStore::new(pool));

    let api_token = resolve_api_token(&config.services);
    if api_token.is_none() {
        warn!("No model service API token configured, requests are sent unauthenticated");
    }
    let registry = ServiceRegistry::from_config(&config.services, api_token)
        .context("Failed to initialize model service clients")?;

    let orchestrator = Arc::new(PipelineOrchestrator::new(&registry, store, &config.pipeline));

    if args.once {
        return run_once(&orchestrator).await;
    }

    let state = AppState::new(orchestrator);
    let app = vri_ai::build_router(state);

    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Log filter for this service's crates at `level`
fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("vri_ai={level},vri_common={level},tower_http=info"))
}

/// Switch the installed filter to the configured level
fn apply_log_level(handle: &reload::Handle<EnvFilter, Registry>, level: &str) {
    if let Err(e) = handle.reload(default_filter(level)) {
        warn!("Failed to apply configured log level {}: {}", level, e);
    }
}

/// Execute one pass and print the report
///
/// Ctrl+C cancels the pass; the partial report is still printed.
async fn run_once(orchestrator: &PipelineOrchestrator) -> Result<()> {
    let mut run = PipelineRun::new();
    let cancel_token = CancellationToken::new();

    let watcher = {
        let cancel_token = cancel_token.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancel_token.cancel();
        })
    };

    let outcome = orchestrator.execute_run(&mut run, &cancel_token).await;
    watcher.abort();

    println!(
        "{}",
        serde_json::to_string_pretty(&run).context("Failed to serialize run report")?
    );

    outcome.context("Review intelligence pass failed")
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
