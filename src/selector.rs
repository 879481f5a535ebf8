//! Active-record selection.
//!
//! Given every managed record of a hostname, picks the records that should
//! be served: per address family, the healthy record with the highest
//! priority. The selection itself is a pure function of the records'
//! current status; the per-hostname gauges are updated on the way out.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use crate::metrics;
use crate::record::{DnsRecord, ManagedRecord, RecordFamily};

/// Select the records that should be active for `hostname`.
///
/// Returns at most one record per family; an empty result means no healthy
/// address exists for the hostname. Priorities are unique per hostname by
/// configuration; equal priorities would fall back to address order.
pub fn select_active(hostname: &str, records: &[Arc<ManagedRecord>]) -> Vec<DnsRecord> {
    let mut healthy: HashMap<RecordFamily, Vec<&DnsRecord>> = HashMap::new();
    for record in records {
        if record.status().is_healthy() {
            healthy
                .entry(record.record().family)
                .or_default()
                .push(record.record());
        }
    }

    let mut active = Vec::with_capacity(2);
    for bucket in healthy.values_mut() {
        bucket.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.address.cmp(&b.address))
        });
        if let Some(best) = bucket.first() {
            active.push(**best);
        }
    }

    update_metrics(hostname, records, &active);
    active
}

fn update_metrics(hostname: &str, records: &[Arc<ManagedRecord>], active: &[DnsRecord]) {
    let active_ips: HashSet<IpAddr> = active.iter().map(|record| record.address).collect();

    for record in records {
        let ip = record.record().address;
        metrics::record_active_record(hostname, ip, active_ips.contains(&ip));
    }
    metrics::record_active_records(hostname, active.len());
    metrics::record_configured_records(hostname, records.len());
}
