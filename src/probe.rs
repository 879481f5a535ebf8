//! Health check probes.
//!
//! A probe answers one question about one address: is it serving? The
//! option bag from the configuration is parsed once at construction; the
//! probe itself only opens a short-lived socket per run.

use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use surge_ping::{PingIdentifier, PingSequence, SurgeError, ICMP};
use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::ProbeConfig;
use crate::record::DnsRecord;

const TCP_DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const ICMP_DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_ACCEPTED_STATUS: [u16; 3] = [200, 201, 301];
const ICMP_PAYLOAD: [u8; 56] = [0; 56];

/// Errors produced while constructing or running a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// An option in the probe's configuration could not be parsed.
    #[error("invalid probe options: {0}")]
    Options(String),

    /// Transport-level IO failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// ICMP failure other than a missing reply.
    #[error("ICMP error: {0}")]
    Icmp(#[from] SurgeError),
}

/// A finite-time health check against a single address.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe once. `Ok(true)` means serving, `Ok(false)` means reachable
    /// but not serving (or not reachable in time), `Err` means the probe
    /// could not produce a verdict.
    async fn is_healthy(&self) -> Result<bool, ProbeError>;
}

/// Build the probe described by `config` for the given record.
pub fn build(
    hostname: &str,
    record: &DnsRecord,
    config: &ProbeConfig,
) -> Result<Box<dyn Probe>, ProbeError> {
    match config {
        ProbeConfig::Tcp { port, timeout } => {
            Ok(Box::new(TcpProbe::new(record.address, port, timeout.as_deref())?))
        }
        ProbeConfig::Icmp {
            timeout,
            privileged,
        } => Ok(Box::new(IcmpProbe::new(
            record.address,
            timeout.as_deref(),
            *privileged,
        )?)),
        ProbeConfig::Http { use_tls, port } => Ok(Box::new(HttpProbe::new(
            hostname,
            record.address,
            use_tls.unwrap_or(false),
            port.as_deref(),
        )?)),
    }
}

fn parse_port(raw: &str) -> Result<u16, ProbeError> {
    let port: u16 = raw
        .parse()
        .map_err(|_| ProbeError::Options(format!("could not parse port {raw:?} as integer")))?;
    if port == 0 {
        return Err(ProbeError::Options("port must be 1..=65535".to_string()));
    }
    Ok(port)
}

fn parse_timeout(raw: Option<&str>, default: Duration) -> Result<Duration, ProbeError> {
    match raw {
        None => Ok(default),
        Some(raw) => humantime::parse_duration(raw)
            .map_err(|err| ProbeError::Options(format!("timeout could not be parsed: {err}"))),
    }
}

/// TCP connect probe. A completed connect or a connection refused both
/// prove the host is reachable.
pub struct TcpProbe {
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpProbe {
    /// Parse options and bind the probe to an address.
    pub fn new(address: IpAddr, port: &str, timeout: Option<&str>) -> Result<Self, ProbeError> {
        Ok(Self {
            addr: SocketAddr::new(address, parse_port(port)?),
            timeout: parse_timeout(timeout, TCP_DEFAULT_TIMEOUT)?,
        })
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn is_healthy(&self) -> Result<bool, ProbeError> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_stream)) => Ok(true),
            // A refused connection means the remote system replied.
            Ok(Err(err)) if err.kind() == io::ErrorKind::ConnectionRefused => Ok(true),
            Ok(Err(err)) => Err(err.into()),
            Err(_elapsed) => Ok(false),
        }
    }
}

/// Single-echo ICMP probe.
pub struct IcmpProbe {
    address: IpAddr,
    timeout: Duration,
    privileged: bool,
}

impl IcmpProbe {
    /// Parse options and bind the probe to an address.
    pub fn new(
        address: IpAddr,
        timeout: Option<&str>,
        privileged: Option<bool>,
    ) -> Result<Self, ProbeError> {
        Ok(Self {
            address,
            timeout: parse_timeout(timeout, ICMP_DEFAULT_TIMEOUT)?,
            privileged: privileged.unwrap_or(default_privileged()),
        })
    }
}

fn default_privileged() -> bool {
    cfg!(any(target_os = "linux", target_os = "windows"))
}

#[async_trait]
impl Probe for IcmpProbe {
    async fn is_healthy(&self) -> Result<bool, ProbeError> {
        let kind = match self.address {
            IpAddr::V4(_) => ICMP::V4,
            IpAddr::V6(_) => ICMP::V6,
        };
        let mut config = surge_ping::Config::builder().kind(kind);
        if !self.privileged {
            config = config.sock_type_hint(socket2::Type::DGRAM);
        }

        let client = surge_ping::Client::new(&config.build())?;
        let mut pinger = client
            .pinger(self.address, PingIdentifier(rand::random()))
            .await;
        pinger.timeout(self.timeout);

        match pinger.ping(PingSequence(0), &ICMP_PAYLOAD).await {
            Ok(_reply) => Ok(true),
            Err(SurgeError::Timeout { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// HTTP GET probe, optionally over TLS.
///
/// With TLS the client resolves the configured hostname to the record's
/// address, so SNI and certificate verification target the hostname while
/// the TCP peer is the address being probed.
pub struct HttpProbe {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpProbe {
    /// Parse options and build the HTTP client.
    pub fn new(
        hostname: &str,
        address: IpAddr,
        use_tls: bool,
        port: Option<&str>,
    ) -> Result<Self, ProbeError> {
        if hostname.is_empty() {
            return Err(ProbeError::Options("empty hostname supplied".to_string()));
        }

        let port = port.map(parse_port).transpose()?;
        let mut builder = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none());

        let endpoint = if use_tls {
            builder = builder
                .use_rustls_tls()
                .min_tls_version(reqwest::tls::Version::TLS_1_3)
                .resolve(hostname, SocketAddr::new(address, 0));
            match port {
                Some(port) => format!("https://{hostname}:{port}"),
                None => format!("https://{hostname}"),
            }
        } else {
            let host = match address {
                IpAddr::V4(v4) => v4.to_string(),
                IpAddr::V6(v6) => format!("[{v6}]"),
            };
            match port {
                Some(port) => format!("http://{host}:{port}"),
                None => format!("http://{host}"),
            }
        };

        Ok(Self {
            endpoint,
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn is_healthy(&self) -> Result<bool, ProbeError> {
        let response = self.client.get(&self.endpoint).send().await?;
        Ok(HTTP_ACCEPTED_STATUS.contains(&response.status().as_u16()))
    }
}
