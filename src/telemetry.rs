//! Telemetry setup for dns-ha.
//!
//! Tracing goes to stdout through `tracing-subscriber`. Metrics are exposed
//! either over HTTP (`metrics_addr`) or by periodically dumping the
//! Prometheus text format to a file (`metrics_file`); both modes refresh the
//! heartbeat gauge once a minute.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, DEFAULT_METRICS_ADDR};
use crate::error::DnsHaError;
use crate::metrics as ha_metrics;

/// How often the heartbeat gauge is refreshed and, in file mode, the
/// metrics file rewritten.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Initialize tracing with an env-filter; `--debug` lowers the default
/// level to `debug`.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Where metrics are exposed.
#[derive(Debug, Clone)]
pub enum MetricsSink {
    /// Serve `/metrics` over HTTP.
    Http(SocketAddr),
    /// Rewrite a Prometheus text file once a minute.
    File(PathBuf),
}

impl MetricsSink {
    /// Derive the sink from a validated configuration, falling back to the
    /// default listen address when neither option is set.
    pub fn from_config(config: &Config) -> Self {
        match (config.metrics_addr, &config.metrics_file) {
            (Some(addr), _) => MetricsSink::Http(addr),
            (None, Some(path)) => MetricsSink::File(path.clone()),
            (None, None) => MetricsSink::Http(DEFAULT_METRICS_ADDR),
        }
    }
}

/// Install the Prometheus recorder and start the exposition tasks.
///
/// Returns a receiver that yields at most one message: a fatal error from
/// the metrics subsystem (the process is expected to exit with code 1).
pub fn start_metrics(
    sink: MetricsSink,
    cancel: CancellationToken,
) -> Result<mpsc::Receiver<String>, DnsHaError> {
    let (failures, failure_rx) = mpsc::channel(1);

    match sink {
        MetricsSink::Http(addr) => {
            let (recorder, exporter) = PrometheusBuilder::new()
                .with_http_listener(addr)
                .build()?;
            metrics::set_global_recorder(recorder).map_err(|_| {
                DnsHaError::Config("a global metrics recorder is already installed".to_string())
            })?;
            info!(%addr, "Prometheus metrics exporter started");

            tokio::spawn(async move {
                if let Err(err) = exporter.await {
                    let _ = failures.send(format!("metrics server failed: {err:?}")).await;
                }
            });
            tokio::spawn(heartbeat_loop(cancel));
        }
        MetricsSink::File(path) => {
            let handle = PrometheusBuilder::new().install_recorder()?;
            info!(path = %path.display(), "dumping metrics to file");
            tokio::spawn(file_writer_loop(handle, path, cancel));
        }
    }

    // Only meaningful once the global recorder is in place.
    ha_metrics::record_process_start();
    ha_metrics::record_heartbeat();

    Ok(failure_rx)
}

/// Refresh the heartbeat gauge until shutdown.
async fn heartbeat_loop(cancel: CancellationToken) {
    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    interval.tick().await; // immediate first tick; heartbeat already set

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => ha_metrics::record_heartbeat(),
        }
    }
}

/// Periodically render the registry to the metrics file.
async fn file_writer_loop(handle: PrometheusHandle, path: PathBuf, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {
                ha_metrics::record_heartbeat();
                if let Err(err) = write_metrics(&handle, &path) {
                    error!(%err, "error dumping metrics");
                }
            }
        }
    }
}

/// Write the rendered metrics via a sibling temp file and rename.
fn write_metrics(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    let rendered = handle.render();
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, rendered)?;
    std::fs::rename(&tmp, path)
}
