//! Metrics instrumentation for dns-ha.
//!
//! All metrics are prefixed with `dns_ha_`.

use metrics::{counter, gauge};
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::status::{HEALTHY_STATE_NAME, UNHEALTHY_STATE_NAME};

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// Record the start of the process.
pub fn record_process_start() {
    gauge!("dns_ha_process_start_timestamp_seconds").set(unix_now());
}

/// Refresh the heartbeat timestamp.
pub fn record_heartbeat() {
    gauge!("dns_ha_heartbeat_timestamp_seconds").set(unix_now());
}

/// Count an error, labelled by hostname and reason.
pub fn record_error(hostname: &str, error: &str) {
    counter!(
        "dns_ha_errors_total",
        "hostname" => hostname.to_string(),
        "error" => error.to_string()
    )
    .increment(1);
}

/// Record the current status of a record as a 0/1 gauge per terminal state.
pub fn record_status(hostname: &str, ip: IpAddr, status_name: &str) {
    for state in [HEALTHY_STATE_NAME, UNHEALTHY_STATE_NAME] {
        let value = if state == status_name { 1.0 } else { 0.0 };
        gauge!(
            "dns_ha_status",
            "hostname" => hostname.to_string(),
            "ip" => ip.to_string(),
            "status" => state
        )
        .set(value);
    }
}

/// Record the time of a record's status change.
pub fn record_status_change(hostname: &str, ip: IpAddr) {
    gauge!(
        "dns_ha_status_change_timestamp_seconds",
        "hostname" => hostname.to_string(),
        "ip" => ip.to_string()
    )
    .set(unix_now());
}

/// Record whether an address is currently active for its hostname.
pub fn record_active_record(hostname: &str, ip: IpAddr, active: bool) {
    gauge!(
        "dns_ha_active_record",
        "hostname" => hostname.to_string(),
        "ip" => ip.to_string()
    )
    .set(if active { 1.0 } else { 0.0 });
}

/// Record the number of active records for a hostname.
pub fn record_active_records(hostname: &str, count: usize) {
    gauge!("dns_ha_active_records_total", "hostname" => hostname.to_string()).set(count as f64);
}

/// Record the number of configured records for a hostname.
pub fn record_configured_records(hostname: &str, count: usize) {
    gauge!("dns_ha_configured_records_total", "hostname" => hostname.to_string()).set(count as f64);
}
