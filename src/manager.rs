//! Periodic control loop driving probes, selection, reconciliation and
//! resolver reloads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::record::ManagedRecord;
use crate::selector;
use crate::service::{ServiceError, ServiceLifecycle};
use crate::unbound::ZoneFile;

/// Wall-clock interval between ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Owns every managed record and drives them through the periodic tick.
pub struct RecordManager {
    zone: ZoneFile,
    service: Box<dyn ServiceLifecycle>,
    records: HashMap<String, Vec<Arc<ManagedRecord>>>,

    /// Hostnames currently known to have no healthy address, so the warning
    /// fires once per outage rather than once per tick.
    unhealthy_hosts: HashMap<String, bool>,
}

impl RecordManager {
    /// Create a manager over the given zone file, supervisor and records.
    pub fn new(
        zone: ZoneFile,
        service: Box<dyn ServiceLifecycle>,
        records: HashMap<String, Vec<Arc<ManagedRecord>>>,
    ) -> Self {
        let unhealthy_hosts = HashMap::with_capacity(records.len());
        Self {
            zone,
            service,
            records,
            unhealthy_hosts,
        }
    }

    /// Run ticks until cancelled: once immediately, then every
    /// [`TICK_INTERVAL`]. Ticks never overlap.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("record manager shutting down");
                    return;
                }

                _ = interval.tick() => {
                    self.tick(&cancel).await;
                }
            }
        }
    }

    /// One pass: evaluate every record in parallel, then reconcile each
    /// hostname and reload the resolver if anything changed.
    pub async fn tick(&mut self, cancel: &CancellationToken) {
        self.run_probes(cancel).await;
        if cancel.is_cancelled() {
            return;
        }

        let mut reload_needed = false;
        for (hostname, records) in &self.records {
            let active = selector::select_active(hostname, records);

            if active.is_empty() {
                let all_initial = records.iter().all(|record| record.status().is_initial());
                let already_warned = self
                    .unhealthy_hosts
                    .get(hostname)
                    .copied()
                    .unwrap_or(false);
                if !already_warned && !all_initial {
                    warn!(%hostname, "no healthy IPs detected");
                    self.unhealthy_hosts.insert(hostname.clone(), true);
                }
                // Fail static: the zone keeps its last good record set.
                continue;
            }

            if self.unhealthy_hosts.get(hostname).copied().unwrap_or(false) {
                info!(%hostname, "records for hostname recovered from unhealthy state");
                self.unhealthy_hosts.insert(hostname.clone(), false);
            }

            match self.zone.reconcile(hostname, &active).await {
                Ok(true) => {
                    let ips: Vec<String> = active
                        .iter()
                        .map(|record| record.address.to_string())
                        .collect();
                    info!(%hostname, ?ips, "updating DNS records");
                    reload_needed = true;
                }
                Ok(false) => {
                    debug!(%hostname, "zone already up to date");
                }
                Err(err) => {
                    metrics::record_error(hostname, "update_ips");
                    error!(%hostname, %err, "could not update active IPs");
                }
            }
        }

        if reload_needed {
            self.restart_service().await;
        }
    }

    /// Evaluate every managed record concurrently and wait for all of them.
    async fn run_probes(&self, cancel: &CancellationToken) {
        let mut evaluations = JoinSet::new();
        for records in self.records.values() {
            for record in records {
                let record = Arc::clone(record);
                let cancel = cancel.clone();
                evaluations.spawn(async move {
                    record.evaluate(&cancel).await;
                });
            }
        }

        while let Some(result) = evaluations.join_next().await {
            if let Err(err) = result {
                error!(%err, "probe evaluation task failed");
            }
        }
    }

    /// Reload the resolver, falling back to a restart when reloading is not
    /// supported or fails. Never fatal.
    async fn restart_service(&self) {
        if let Err(err) = self.service.reload().await {
            if !matches!(err, ServiceError::ReloadNotSupported) {
                error!(%err, "could not reload service");
            }

            if let Err(err) = self.service.restart().await {
                metrics::record_error("", "service_restart");
                error!(%err, "could not restart service");
            }
        }
    }
}
