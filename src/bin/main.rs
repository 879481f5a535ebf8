//! dns-ha binary entry point.

use clap::Parser;
use dns_ha::record::build_managed_records;
use dns_ha::telemetry::{self, MetricsSink};
use dns_ha::{Config, DnsHaError, RecordManager, SystemdUnit, ZoneFile};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// How long components may take to shut down before the process exits
/// anyway.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Keeps unbound's local-data records pointing at healthy backends.
#[derive(Parser, Debug)]
#[command(name = "dns-ha")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML).
    #[arg(short, long, default_value = "/etc/dns-ha.yaml")]
    config: PathBuf,

    /// Print debug logs.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init_tracing(args.debug);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting dns-ha");

    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!(%err, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, DnsHaError> {
    let config = Config::load(&args.config)?;
    config.validate()?;

    let zone = ZoneFile::new(&config.unbound.db_file, config.unbound.create_file)?;
    let service = SystemdUnit::new(&config.unbound.service_name).await?;
    let records = build_managed_records(&config)?;

    let cancel = CancellationToken::new();
    let mut metrics_failures =
        telemetry::start_metrics(MetricsSink::from_config(&config), cancel.clone())?;

    info!(
        config_file = %args.config.display(),
        db_file = %config.unbound.db_file.display(),
        hostnames = config.records.len(),
        "configuration loaded"
    );

    let mut manager = RecordManager::new(zone, Box::new(service), records);
    let manager_cancel = cancel.clone();
    let manager_handle = tokio::spawn(async move {
        manager.run(manager_cancel).await;
    });

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let exit_code = tokio::select! {
        _ = sighup.recv() => {
            info!("Received signal");
            ExitCode::SUCCESS
        }
        _ = sigint.recv() => {
            info!("Received signal");
            ExitCode::SUCCESS
        }
        _ = sigterm.recv() => {
            info!("Received signal");
            ExitCode::SUCCESS
        }
        _ = sigquit.recv() => {
            info!("Received signal");
            ExitCode::SUCCESS
        }
        Some(err) = metrics_failures.recv() => {
            error!(%err, "could not run metrics subsystem");
            ExitCode::FAILURE
        }
    };

    cancel.cancel();
    info!("Waiting for components to shut down gracefully");
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, manager_handle).await {
        Ok(_) => info!("dns-ha shutdown complete"),
        Err(_) => error!("shutdown timed out, exiting anyway"),
    }

    Ok(exit_code)
}
