//! Supervisor control for the resolver process.

use async_trait::async_trait;
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors from the service supervisor.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The unit cannot be reloaded; callers should restart instead.
    #[error("reload not supported")]
    ReloadNotSupported,

    /// No unit name was configured.
    #[error("empty service name provided")]
    EmptyServiceName,

    /// The configured unit does not exist.
    #[error("systemd service {0:?} does not seem to exist")]
    UnitNotFound(String),

    /// The supervisor command ran but reported failure.
    #[error("failed to {operation} service {unit}: {status}")]
    CommandFailed {
        /// The attempted operation (`reload` or `restart`).
        operation: &'static str,
        /// The unit the operation targeted.
        unit: String,
        /// Exit status of the supervisor command.
        status: ExitStatus,
    },

    /// The supervisor command could not be spawned.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reload/restart capability for the resolver process.
#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    /// Hot-reload the service. May fail with
    /// [`ServiceError::ReloadNotSupported`], in which case the caller is
    /// expected to fall back to [`ServiceLifecycle::restart`].
    async fn reload(&self) -> Result<(), ServiceError>;

    /// Fully restart the service.
    async fn restart(&self) -> Result<(), ServiceError>;
}

/// A systemd unit driven through `systemctl`.
pub struct SystemdUnit {
    unit: String,
}

impl SystemdUnit {
    /// Bind to a systemd unit, verifying that it exists.
    pub async fn new(unit: &str) -> Result<Self, ServiceError> {
        if unit.is_empty() {
            return Err(ServiceError::EmptyServiceName);
        }

        let output = Command::new("systemctl")
            .arg("status")
            .arg(unit)
            .output()
            .await?;

        // systemctl reports missing units in its status output rather than
        // through a dedicated exit code.
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if combined.contains("Loaded: not-found") {
            return Err(ServiceError::UnitNotFound(unit.to_string()));
        }

        Ok(Self {
            unit: unit.to_string(),
        })
    }

    async fn run(&self, operation: &'static str) -> Result<(), ServiceError> {
        debug!(unit = %self.unit, operation, "invoking systemctl");
        let status = Command::new("systemctl")
            .arg(operation)
            .arg(&self.unit)
            .status()
            .await?;

        if !status.success() {
            return Err(ServiceError::CommandFailed {
                operation,
                unit: self.unit.clone(),
                status,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceLifecycle for SystemdUnit {
    async fn reload(&self) -> Result<(), ServiceError> {
        self.run("reload").await
    }

    async fn restart(&self) -> Result<(), ServiceError> {
        self.run("restart").await
    }
}
