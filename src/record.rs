//! Managed DNS records: the declared address plus the machinery that keeps
//! track of whether it is serving.

use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, RecordConfig};
use crate::error::DnsHaError;
use crate::metrics;
use crate::probe::{self, Probe};
use crate::status::{Observation, Status, StatusPolicy};

/// DNS address family of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum RecordFamily {
    /// IPv4.
    A,
    /// IPv6.
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl fmt::Display for RecordFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFamily::A => write!(f, "A"),
            RecordFamily::Aaaa => write!(f, "AAAA"),
        }
    }
}

/// Immutable record data as declared by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsRecord {
    /// Operator-assigned priority; the highest healthy one wins per family.
    pub priority: u8,
    /// Address family.
    pub family: RecordFamily,
    /// The backend address.
    pub address: IpAddr,
    /// Record TTL in seconds.
    pub ttl: u16,
}

impl From<&RecordConfig> for DnsRecord {
    fn from(conf: &RecordConfig) -> Self {
        Self {
            priority: conf.prio as u8,
            family: conf.record_type,
            address: conf.ip,
            ttl: conf.ttl,
        }
    }
}

/// A declared record bound to its probe and hysteresis state.
///
/// The mutable status lives behind a mutex so that different records can be
/// evaluated concurrently; the manager evaluates each record at most once
/// per tick.
pub struct ManagedRecord {
    hostname: String,
    record: DnsRecord,
    policy: StatusPolicy,
    probe: Box<dyn Probe>,
    state: Mutex<RecordState>,
}

struct RecordState {
    status: Status,
    last_transition: Option<Instant>,
}

impl ManagedRecord {
    /// Bind a record to its probe, starting in the initial status.
    pub fn new(
        hostname: &str,
        record: DnsRecord,
        policy: StatusPolicy,
        probe: Box<dyn Probe>,
    ) -> Self {
        Self {
            hostname: hostname.to_string(),
            record,
            policy,
            probe,
            state: Mutex::new(RecordState {
                status: Status::initial(&policy),
                last_transition: None,
            }),
        }
    }

    /// The hostname this record belongs to.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The declared record data.
    pub fn record(&self) -> &DnsRecord {
        &self.record
    }

    /// Current status snapshot.
    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    /// When the record last changed state, if it ever has.
    pub fn last_transition(&self) -> Option<Instant> {
        self.state.lock().last_transition
    }

    /// Run the probe once and feed the outcome to the state machine.
    ///
    /// Cancellation aborts the wait on the probe and is recorded as an
    /// errored observation.
    pub async fn evaluate(&self, cancel: &CancellationToken) {
        let observation = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(ip = %self.record.address, "probe cancelled");
                Observation::Error
            }

            result = self.probe.is_healthy() => match result {
                Ok(true) => Observation::Healthy,
                Ok(false) => Observation::Unhealthy,
                Err(err) => {
                    warn!(
                        hostname = %self.hostname,
                        ip = %self.record.address,
                        %err,
                        "healthcheck produced error"
                    );
                    metrics::record_error(&self.hostname, "healthcheck");
                    Observation::Error
                }
            }
        };

        debug!(ip = %self.record.address, ?observation, "healthcheck");
        self.observe(observation);
    }

    /// Step the state machine, stamping and reporting a transition when the
    /// state name changes.
    fn observe(&self, observation: Observation) {
        let mut state = self.state.lock();
        let old_name = state.status.name();
        state.status = state.status.step(observation, &self.policy);

        if state.status.name() != old_name {
            state.last_transition = Some(Instant::now());
            info!(
                hostname = %self.hostname,
                ip = %self.record.address,
                old = old_name,
                new = state.status.name(),
                "status change"
            );
            metrics::record_status_change(&self.hostname, self.record.address);
            metrics::record_status(&self.hostname, self.record.address, state.status.name());
        }
    }

    #[cfg(test)]
    pub(crate) fn set_status(&self, status: Status) {
        self.state.lock().status = status;
    }
}

/// Build every managed record declared in the configuration.
pub fn build_managed_records(
    config: &Config,
) -> Result<HashMap<String, Vec<Arc<ManagedRecord>>>, DnsHaError> {
    let mut managed = HashMap::with_capacity(config.records.len());

    for (hostname, records) in &config.records {
        let mut bound = Vec::with_capacity(records.len());
        for conf in records {
            let record = DnsRecord::from(conf);
            let probe = probe::build(hostname, &record, &conf.healthcheck).map_err(|err| {
                DnsHaError::Config(format!(
                    "could not build healthcheck for {hostname} ({}): {err}",
                    record.address
                ))
            })?;
            bound.push(Arc::new(ManagedRecord::new(
                hostname,
                record,
                conf.status,
                probe,
            )));
        }
        managed.insert(hostname.clone(), bound);
    }

    Ok(managed)
}
