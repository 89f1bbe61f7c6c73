//! # forecast-server
//!
//! Loads the best tracked model once and serves forecasts over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use demand_forecast::logging::init_tracing;
use demand_forecast::{FileTrackingStore, ModelSelector, ServiceConfig};
use forecast_server::{build_router, AppState, DEFAULT_LOG_FILTER};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "forecast-server")]
#[command(about = "Serve forecasts from the best tracked demand model", long_about = None)]
struct Cli {
    /// Configuration file, overrides FORECAST_CONFIG_FILE
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(DEFAULT_LOG_FILTER)?;
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => ServiceConfig::load_from(Some(path.as_path())),
        None => ServiceConfig::load(),
    }
    .context("loading configuration")?;
    let mapping = config.column_mapping()?;

    let store = FileTrackingStore::open(&config.tracking_uri)?;
    let loaded = ModelSelector::new(&config.selection_metric)
        .load_best(&store)
        .context("selecting the model to serve")?;
    info!(
        run_id = %loaded.run.run_id(),
        tracking_uri = %config.tracking_uri.display(),
        "Model ready"
    );

    let max_upload_bytes = usize::try_from(config.max_upload_bytes)
        .context("max_upload_bytes does not fit in memory")?;
    let app = build_router(AppState::from_loaded(loaded, mapping), max_upload_bytes);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
