//! dns-ha - DNS-based high availability for small, statically-configured
//! fleets.
//!
//! For each managed hostname an operator declares two or more candidate
//! addresses with priorities. dns-ha continuously probes them, applies
//! hysteresis to status transitions, selects the highest-priority healthy
//! address per address family and reconciles unbound's local-data file,
//! reloading unbound only when the file actually changed.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                            dns-ha                              │
//! │                                                                │
//! │  ┌──────────────┐   ┌───────────────┐   ┌──────────────────┐  │
//! │  │  Probes      │──▶│  Hysteresis   │──▶│  Selector        │  │
//! │  │  tcp/icmp/   │   │  state        │   │  (per family,    │  │
//! │  │  http        │   │  machine      │   │  by priority)    │  │
//! │  └──────────────┘   └───────────────┘   └────────┬─────────┘  │
//! │        ▲ every 30s                               │            │
//! │  ┌─────┴────────┐   ┌───────────────┐   ┌────────▼─────────┐  │
//! │  │ RecordManager│──▶│  systemctl    │◀──│  ZoneFile        │  │
//! │  │ (tick loop)  │   │  reload/      │   │  local-data diff │  │
//! │  └──────────────┘   │  restart      │   │  + atomic write  │  │
//! │                     └───────────────┘   └──────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Zone ownership
//!
//! dns-ha owns exactly the lines `local-data: "HOSTNAME TTL FAMILY ADDRESS"`
//! for hostnames listed in its configuration. Every other line of the zone
//! file is preserved byte for byte.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use dns_ha::{Config, RecordManager, SystemdUnit, ZoneFile};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load("/etc/dns-ha.yaml".as_ref()).unwrap();
//!     config.validate().unwrap();
//!
//!     let zone = ZoneFile::new(&config.unbound.db_file, config.unbound.create_file).unwrap();
//!     let service = SystemdUnit::new(&config.unbound.service_name).await.unwrap();
//!     let records = dns_ha::record::build_managed_records(&config).unwrap();
//!
//!     let mut manager = RecordManager::new(zone, Box::new(service), records);
//!     manager.run(CancellationToken::new()).await;
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod probe;
pub mod record;
pub mod selector;
pub mod service;
pub mod status;
pub mod telemetry;
pub mod unbound;

// Re-export main types
pub use config::{Config, ProbeConfig, RecordConfig, UnboundConfig};
pub use error::DnsHaError;
pub use manager::RecordManager;
pub use probe::{Probe, ProbeError};
pub use record::{DnsRecord, ManagedRecord, RecordFamily};
pub use service::{ServiceError, ServiceLifecycle, SystemdUnit};
pub use status::{Observation, Status, StatusPolicy};
pub use unbound::ZoneFile;
