//! Unbound local-data zone store.
//!
//! The zone file is an ordered sequence of lines; dns-ha owns exactly the
//! lines of the form `local-data: "HOSTNAME TTL FAMILY ADDRESS"` for its
//! managed hostnames and preserves everything else byte for byte.
//! Reconciliation diffs the desired records against the file, rewrites it
//! atomically (temp file + rename) and runs unbound's own config checker
//! before a reload is allowed.

use std::collections::HashSet;
use std::fs::{File, OpenOptions, Permissions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{error, warn};

use crate::error::DnsHaError;
use crate::metrics;
use crate::record::DnsRecord;

const VALIDATOR_COMMAND: &str = "unbound-checkconf";
const ZONE_FILE_MODE: u32 = 0o640;

/// The managed local-data file of an unbound instance.
pub struct ZoneFile {
    path: PathBuf,
    validator: String,
}

impl ZoneFile {
    /// Open the zone file at `path`, creating it when `create_file` is set.
    ///
    /// Fails when the file is missing and may not be created, or when it
    /// exists but is not writable.
    pub fn new(path: impl Into<PathBuf>, create_file: bool) -> Result<Self, DnsHaError> {
        Self::with_validator(path, create_file, VALIDATOR_COMMAND)
    }

    /// Like [`ZoneFile::new`], with a custom validator command.
    pub fn with_validator(
        path: impl Into<PathBuf>,
        create_file: bool,
        validator: &str,
    ) -> Result<Self, DnsHaError> {
        let path = path.into();

        if path.try_exists()? {
            // Probe writability up front instead of failing mid-tick.
            OpenOptions::new().append(true).open(&path).map_err(|_| {
                DnsHaError::Config(format!("zone file {} is not writable", path.display()))
            })?;
        } else if create_file {
            let file = File::create(&path)?;
            file.set_permissions(Permissions::from_mode(ZONE_FILE_MODE))?;
        } else {
            return Err(DnsHaError::Config(format!(
                "zone file {} does not exist and create_file is false",
                path.display()
            )));
        }

        Ok(Self {
            path,
            validator: validator.to_string(),
        })
    }

    /// Make the file's owned lines for `hostname` match `desired`.
    ///
    /// Returns `Ok(true)` when the file changed and passed validation;
    /// `Ok(false)` when nothing had to change, or when the rewritten file
    /// failed validation (in which case it is left in place for the next
    /// tick to converge on).
    pub async fn reconcile(
        &self,
        hostname: &str,
        desired: &[DnsRecord],
    ) -> Result<bool, DnsHaError> {
        let lines = self.read_lines()?;
        let desired_lines: Vec<String> = desired
            .iter()
            .map(|record| record_line(hostname, record))
            .collect();

        let Some(updated) = apply_records(lines, hostname, &desired_lines) else {
            return Ok(false);
        };

        self.write_atomic(&updated)?;

        if let Err(err) = self.validate().await {
            metrics::record_error(hostname, "dns_invalid_config");
            error!(hostname, %err, "updated unbound config failed validation");
            return Ok(false);
        }

        Ok(true)
    }

    fn read_lines(&self) -> Result<Vec<String>, DnsHaError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let trimmed = content.trim_end();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        Ok(trimmed.split('\n').map(str::to_string).collect())
    }

    fn write_atomic(&self, lines: &[String]) -> Result<(), DnsHaError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(lines.join("\n").as_bytes())?;
        tmp.as_file()
            .set_permissions(Permissions::from_mode(ZONE_FILE_MODE))?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    async fn validate(&self) -> Result<(), DnsHaError> {
        let status = Command::new(&self.validator).status().await?;
        if !status.success() {
            return Err(DnsHaError::Validation(format!(
                "{} exited with {status}",
                self.validator
            )));
        }
        Ok(())
    }
}

/// The canonical zone line for a record.
fn record_line(hostname: &str, record: &DnsRecord) -> String {
    format!(
        "local-data: \"{} {} {} {}\"",
        hostname, record.ttl, record.family, record.address
    )
}

/// Diff `lines` against `desired` for `hostname`.
///
/// Returns the updated line sequence, or `None` when the file already
/// matches. Owned lines that are not desired are removed (including
/// duplicate occurrences of a desired line); missing desired lines are
/// inserted immediately before the last surviving desired line, or appended
/// when none survived.
fn apply_records(
    mut lines: Vec<String>,
    hostname: &str,
    desired: &[String],
) -> Option<Vec<String>> {
    let prefix = format!("local-data: \"{hostname} ");

    let mut present: Vec<Option<usize>> = vec![None; desired.len()];
    let mut stale: Vec<usize> = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if !line.starts_with(&prefix) {
            continue;
        }
        match desired.iter().position(|want| want == line) {
            Some(slot) if present[slot].is_none() => present[slot] = Some(index),
            _ => stale.push(index),
        }
    }

    let missing: Vec<String> = desired
        .iter()
        .zip(&present)
        .filter(|(_, found)| found.is_none())
        .map(|(line, _)| line.clone())
        .collect();

    if missing.is_empty() && stale.is_empty() {
        return None;
    }

    // Where the last surviving desired line will sit after removal.
    let anchor = present
        .iter()
        .flatten()
        .max()
        .map(|&index| index - stale.iter().filter(|&&removed| removed < index).count());

    if !stale.is_empty() {
        warn!(hostname, n = stale.len(), "removing stale records");
        let stale: HashSet<usize> = stale.into_iter().collect();
        lines = lines
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !stale.contains(index))
            .map(|(_, line)| line)
            .collect();
    }

    match anchor {
        Some(at) => {
            lines.splice(at..at, missing);
        }
        None => lines.extend(missing),
    }

    Some(lines)
}
