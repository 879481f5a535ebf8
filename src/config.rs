//! Configuration types for dns-ha.
//!
//! The configuration is a single YAML file (default `/etc/dns-ha.yaml`)
//! mapping hostnames to candidate records. Everything is validated up front
//! via [`Config::validate`]; the control loop assumes a valid config.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};

use crate::error::DnsHaError;
use crate::record::RecordFamily;
use crate::status::StatusPolicy;

/// Metrics address used when neither `metrics_addr` nor `metrics_file` is
/// configured.
pub const DEFAULT_METRICS_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 9223));
const DEFAULT_SERVICE_NAME: &str = "unbound";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Hostname -> candidate records. Each hostname needs at least two
    /// records with distinct priorities and addresses.
    pub records: HashMap<String, Vec<RecordConfig>>,

    /// Unbound integration settings.
    pub unbound: UnboundConfig,

    /// Dump metrics to this file every minute. Mutually exclusive with
    /// `metrics_addr`.
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,

    /// Serve metrics over HTTP on this address. Mutually exclusive with
    /// `metrics_file`.
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

/// One candidate record for a hostname.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordConfig {
    /// The address this record resolves to.
    pub ip: IpAddr,

    /// Record family, `A` or `AAAA`. Must match the address family of `ip`.
    #[serde(rename = "type")]
    pub record_type: RecordFamily,

    /// Priority, 0..=254. Within a hostname and family the highest healthy
    /// priority wins.
    pub prio: u16,

    /// TTL in seconds, 1..=3600.
    pub ttl: u16,

    /// Health check probing this address.
    #[serde(rename = "healthchecker")]
    pub healthcheck: ProbeConfig,

    /// Streak thresholds; defaults to 5/5/2/1.
    #[serde(default)]
    pub status: StatusPolicy,
}

/// Probe selection and options, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbeConfig {
    /// TCP connect probe.
    Tcp {
        /// Target port, parsed from a string, 1..=65535.
        port: String,
        /// Connect timeout (e.g. `2s`), default 5 s.
        #[serde(default)]
        timeout: Option<String>,
    },
    /// Single ICMP echo request.
    Icmp {
        /// Reply timeout (e.g. `1s`), default 3 s.
        #[serde(default)]
        timeout: Option<String>,
        /// Use a raw socket. Defaults to true on Linux and Windows.
        #[serde(default)]
        privileged: Option<bool>,
    },
    /// HTTP GET expecting 200, 201 or 301.
    Http {
        /// Use https with TLS >= 1.3, verifying the certificate against the
        /// configured hostname.
        #[serde(default)]
        use_tls: Option<bool>,
        /// Target port, parsed from a string. Defaults to the scheme's port.
        #[serde(default)]
        port: Option<String>,
    },
}

/// Unbound integration settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UnboundConfig {
    /// The local-data file managed by dns-ha, included from unbound.conf.
    pub db_file: PathBuf,

    /// Systemd unit to reload after changes.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Create `db_file` at startup when it does not exist.
    #[serde(default = "default_create_file")]
    pub create_file: bool,
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn default_create_file() -> bool {
    true
}

impl Config {
    /// Read and parse the configuration file.
    pub fn load(path: &Path) -> Result<Self, DnsHaError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&raw)?;
        Ok(config)
    }

    /// Validate the whole configuration, collecting every violation.
    pub fn validate(&self) -> Result<(), DnsHaError> {
        let mut errors = Vec::new();

        if self.metrics_addr.is_some() && self.metrics_file.is_some() {
            errors.push("metrics_addr and metrics_file are mutually exclusive".to_string());
        }

        for (hostname, records) in &self.records {
            if !is_valid_hostname(hostname) {
                errors.push(format!("{hostname:?} is not a valid hostname"));
            }

            if records.len() < 2 {
                errors.push(format!("less than two records defined for {hostname:?}"));
            }

            let mut seen_prios = HashSet::new();
            let mut seen_ips = HashSet::new();
            for record in records {
                if !seen_prios.insert(record.prio) {
                    errors.push(format!(
                        "duplicated prio {} for record {hostname}",
                        record.prio
                    ));
                }
                if !seen_ips.insert(record.ip) {
                    errors.push(format!(
                        "duplicated ip {} for record {hostname}",
                        record.ip
                    ));
                }

                record.validate(hostname, &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DnsHaError::Config(errors.join("; ")))
        }
    }
}

impl RecordConfig {
    fn validate(&self, hostname: &str, errors: &mut Vec<String>) {
        if self.prio > 254 {
            errors.push(format!(
                "prio {} for record {hostname} exceeds 254",
                self.prio
            ));
        }

        if self.ttl == 0 || self.ttl > 3600 {
            errors.push(format!(
                "ttl {} for record {hostname} outside 1..=3600",
                self.ttl
            ));
        }

        match (self.ip, self.record_type) {
            (IpAddr::V4(_), RecordFamily::A) | (IpAddr::V6(_), RecordFamily::Aaaa) => {}
            _ => errors.push(format!(
                "address {} does not match record type {} for {hostname}",
                self.ip, self.record_type
            )),
        }

        for (what, value) in [
            ("healthy", self.status.healthy),
            ("unhealthy", self.status.unhealthy),
            ("initial_healthy", self.status.initial_healthy),
            ("initial_unhealthy", self.status.initial_unhealthy),
        ] {
            if value == 0 {
                errors.push(format!("status streak {what} for {hostname} must be >= 1"));
            }
        }
    }
}

/// RFC 1123 hostname check: dot-separated alphanumeric labels, hyphens
/// allowed inside a label, at most 253 characters overall.
fn is_valid_hostname(hostname: &str) -> bool {
    let hostname = hostname.strip_suffix('.').unwrap_or(hostname);
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }

    hostname.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
records:
  a.example.com:
    - ip: 10.0.0.1
      type: A
      prio: 200
      ttl: 30
      healthchecker:
        type: tcp
        port: "80"
        timeout: 2s
    - ip: 10.0.0.2
      type: A
      prio: 100
      ttl: 30
      healthchecker:
        type: icmp
      status:
        healthy: 3
        unhealthy: 2
unbound:
  db_file: /etc/unbound/local.d/ha.conf
metrics_addr: 127.0.0.1:9223
"#;

    fn sample() -> Config {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let config = sample();
        let records = &config.records["a.example.com"];
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].prio, 200);
        assert!(matches!(
            records[0].healthcheck,
            ProbeConfig::Tcp { ref port, .. } if port == "80"
        ));
        assert_eq!(config.unbound.service_name, "unbound");
        assert!(config.unbound.create_file);
        config.validate().unwrap();
    }

    #[test]
    fn test_status_defaults_applied() {
        let config = sample();
        let records = &config.records["a.example.com"];
        assert_eq!(records[0].status, StatusPolicy::default());
        assert_eq!(records[1].status.healthy, 3);
        assert_eq!(records[1].status.initial_healthy, 2);
    }

    #[test]
    fn test_unknown_probe_type_rejected() {
        let raw = SAMPLE.replace("type: tcp", "type: carrier-pigeon");
        assert!(serde_yaml::from_str::<Config>(&raw).is_err());
    }

    #[test]
    fn test_single_record_rejected() {
        let mut config = sample();
        config
            .records
            .get_mut("a.example.com")
            .unwrap()
            .truncate(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_prio_rejected() {
        let mut config = sample();
        config.records.get_mut("a.example.com").unwrap()[1].prio = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_ip_rejected() {
        let mut config = sample();
        config.records.get_mut("a.example.com").unwrap()[1].ip = "10.0.0.1".parse().unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_family_mismatch_rejected() {
        let mut config = sample();
        config.records.get_mut("a.example.com").unwrap()[1].ip = "fd00::1".parse().unwrap();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.records.get_mut("a.example.com").unwrap()[1].record_type = RecordFamily::Aaaa;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prio_and_ttl_ranges() {
        let mut config = sample();
        config.records.get_mut("a.example.com").unwrap()[0].prio = 255;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.records.get_mut("a.example.com").unwrap()[0].ttl = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.records.get_mut("a.example.com").unwrap()[0].ttl = 3601;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_sinks_mutually_exclusive() {
        let mut config = sample();
        config.metrics_file = Some(PathBuf::from("/var/lib/metrics/dns-ha.prom"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_hostname_rejected() {
        let mut config = sample();
        let records = config.records.remove("a.example.com").unwrap();
        config.records.insert("-bad.example".to_string(), records);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hostname_rules() {
        assert!(is_valid_hostname("a.example.com"));
        assert!(is_valid_hostname("a.example.com."));
        assert!(is_valid_hostname("host"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("under_score.example"));
        assert!(!is_valid_hostname("double..dot"));
        assert!(!is_valid_hostname("trailing-.example"));
        assert!(!is_valid_hostname(&"x".repeat(254)));
    }
}
