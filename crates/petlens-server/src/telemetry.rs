//! Logging and metrics initialization

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
///
/// Logs go to stderr so `classify` output on stdout stays parseable.
pub fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("petlens=debug,petlens_server=debug,petlens_classifier=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("petlens=info,petlens_server=info,petlens_classifier=info,tower_http=warn")
        })
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Initialize metrics exporter and return handle for rendering
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "petlens_requests_total",
        "Total number of prediction requests received"
    );
    metrics::describe_counter!(
        "petlens_predictions_total",
        "Total number of successful predictions by label"
    );
    metrics::describe_counter!("petlens_errors_total", "Total number of failed requests by kind");
    metrics::describe_histogram!(
        "petlens_inference_latency_us",
        metrics::Unit::Microseconds,
        "Preprocessing and forward pass latency in microseconds"
    );

    tracing::info!("Metrics exporter initialized");
    Ok(handle)
}
