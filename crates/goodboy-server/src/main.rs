//! Who's My Good Boy server
//!
//! Serves dog, Apolo and general image classification over HTTP.

use anyhow::Result;
use clap::Parser;
use goodboy_server::{create_router, AppState, Settings};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "goodboy-server")]
#[command(about = "Who's My Good Boy image classification API", long_about = None)]
struct Cli {
    /// Settings file (TOML, YAML or JSON); environment variables override it
    #[arg(short, long, env = "GOODBOY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short = 'l', long, env = "HOST", default_value = "0.0.0.0")]
    listen: String,

    /// Listen port
    #[arg(short = 'P', long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;

    init_tracing(cli.verbose, &settings);

    info!("Starting Who's My Good Boy API");
    info!("Model source: {}", settings.model_source);
    info!(
        "Models: general={}, dog={}, apolo={}",
        settings.general_model, settings.dog_model, settings.apolo_model
    );

    let metrics_handle = init_metrics()?;

    let state = AppState::new(settings, Some(metrics_handle)).await?;
    info!("Application state initialized successfully");

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", cli.listen, cli.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            warn!("Shutdown signal received, stopping server...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, settings: &Settings) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("goodboy=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("goodboy={}", settings.log_level)))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if settings.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!("goodboy_requests_total", "Total number of HTTP requests");
    metrics::describe_counter!(
        "goodboy_predictions_total",
        "Total number of predictions by classifier and outcome"
    );
    metrics::describe_histogram!(
        "goodboy_prediction_latency_seconds",
        metrics::Unit::Seconds,
        "Prediction latency in seconds by classifier"
    );
    metrics::describe_counter!(
        "goodboy_model_loads_total",
        "Total number of model loads by backend and outcome"
    );
    metrics::describe_counter!(
        "goodboy_loader_constructions_total",
        "Total number of model loader constructions by backend"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
