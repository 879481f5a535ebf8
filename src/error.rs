//! Error types for dns-ha.

use thiserror::Error;

/// Errors that can occur while building or running the service.
#[derive(Debug, Error)]
pub enum DnsHaError {
    /// IO error (zone file, config file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("could not parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Probe construction or transport error
    #[error("probe error: {0}")]
    Probe(#[from] crate::probe::ProbeError),

    /// Service supervisor error
    #[error("service error: {0}")]
    Service(#[from] crate::service::ServiceError),

    /// Metrics exporter could not be built
    #[error("metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// The resolver's own config checker rejected the zone file
    #[error("resolver config validation failed: {0}")]
    Validation(String),
}
