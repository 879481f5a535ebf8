//! Shared test infrastructure for record manager integration tests.

// Not every helper is used by every test binary.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use dns_ha::probe::{Probe, ProbeError};
use dns_ha::record::{DnsRecord, ManagedRecord, RecordFamily};
use dns_ha::service::{ServiceError, ServiceLifecycle};
use dns_ha::status::StatusPolicy;
use dns_ha::unbound::ZoneFile;
use dns_ha::RecordManager;

// --- Constants ---

pub const HOSTNAME: &str = "a.example.com";
pub const UNRELATED_LINE: &str = r#"local-data: "other.tld 30 A 10.9.9.9""#;

/// Policy that settles after a single observation, keeping tick counts low.
pub fn fast_policy() -> StatusPolicy {
    StatusPolicy {
        healthy: 1,
        unhealthy: 1,
        initial_healthy: 1,
        initial_unhealthy: 1,
    }
}

// --- SwitchProbe ---

/// Probe whose verdict can be flipped between ticks.
#[derive(Clone)]
pub struct SwitchProbe {
    healthy: Arc<AtomicBool>,
}

impl SwitchProbe {
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy: Arc::new(AtomicBool::new(healthy)),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl Probe for SwitchProbe {
    async fn is_healthy(&self) -> Result<bool, ProbeError> {
        Ok(self.healthy.load(Ordering::SeqCst))
    }
}

// --- RecordingService ---

/// Records reload/restart invocations; reload can be scripted to report
/// that the unit does not support reloading.
#[derive(Clone)]
pub struct RecordingService {
    calls: Arc<Mutex<Vec<&'static str>>>,
    reload_unsupported: bool,
}

impl RecordingService {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            reload_unsupported: false,
        }
    }

    pub fn with_reload_unsupported() -> Self {
        Self {
            reload_unsupported: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceLifecycle for RecordingService {
    async fn reload(&self) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push("reload");
        if self.reload_unsupported {
            Err(ServiceError::ReloadNotSupported)
        } else {
            Ok(())
        }
    }

    async fn restart(&self) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push("restart");
        Ok(())
    }
}

// --- Zone fixture ---

/// A zone file in a temp directory, with the validator stubbed out.
pub struct ZoneFixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl ZoneFixture {
    pub fn new(initial: &str) -> Self {
        let dir = tempfile::tempdir().expect("could not create temp dir");
        let path = dir.path().join("ha.conf");
        std::fs::write(&path, initial).expect("could not seed zone file");
        Self { _dir: dir, path }
    }

    /// Zone store whose validator always passes.
    pub fn zone(&self) -> ZoneFile {
        ZoneFile::with_validator(&self.path, false, "true").expect("could not open zone file")
    }

    /// Zone store whose validator always rejects.
    pub fn zone_rejecting_validator(&self) -> ZoneFile {
        ZoneFile::with_validator(&self.path, false, "false").expect("could not open zone file")
    }

    pub fn contents(&self) -> String {
        std::fs::read_to_string(&self.path).expect("could not read zone file")
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

// --- Builders ---

pub fn make_record(
    ip: &str,
    family: RecordFamily,
    priority: u8,
    ttl: u16,
    probe: SwitchProbe,
) -> Arc<ManagedRecord> {
    let record = DnsRecord {
        priority,
        family,
        address: ip.parse().expect("invalid test address"),
        ttl,
    };
    Arc::new(ManagedRecord::new(
        HOSTNAME,
        record,
        fast_policy(),
        Box::new(probe),
    ))
}

pub fn make_manager(
    zone: ZoneFile,
    service: RecordingService,
    records: Vec<Arc<ManagedRecord>>,
) -> RecordManager {
    let mut map = HashMap::new();
    map.insert(HOSTNAME.to_string(), records);
    RecordManager::new(zone, Box::new(service), map)
}

pub fn desired_line(ttl: u16, family: &str, ip: &str) -> String {
    format!(r#"local-data: "{HOSTNAME} {ttl} {family} {ip}""#)
}
