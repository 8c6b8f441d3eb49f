//! Reachability probe
//!
//! The probe times a TCP connect to the server's remote shell port. Any answer
//! from the host counts as a reply, including a refused connection: the host
//! is up, it just does not listen there. Only silence until the timeout, or a
//! network that reports the host unreachable, counts as no reply.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpStream, lookup_host};
use tokio::time::Instant;
use tracing::{instrument, trace};

use crate::util::host_and_port;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("cannot resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe of {address} failed: {source}")]
    Io {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Round trip to the host, or `None` when it did not answer in time.
    async fn probe(&self, address: &str) -> Result<Option<Duration>, ProbeError>;
}

#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    async fn resolve(&self, address: &str) -> Result<SocketAddr, ProbeError> {
        let (host, port) = host_and_port(address, self.port)
            .ok_or_else(|| ProbeError::InvalidAddress(address.to_string()))?;

        lookup_host((host.as_str(), port))
            .await
            .map_err(|source| ProbeError::Resolve {
                address: address.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| ProbeError::InvalidAddress(address.to_string()))
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    #[instrument(skip(self))]
    async fn probe(&self, address: &str) -> Result<Option<Duration>, ProbeError> {
        let target = self.resolve(address).await?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, TcpStream::connect(target)).await;
        let elapsed = started.elapsed();

        match outcome {
            Err(_) => {
                trace!("{target}: no answer within {:?}", self.timeout);
                Ok(None)
            }
            Ok(Ok(_stream)) => Ok(Some(elapsed)),
            Ok(Err(e)) => match e.kind() {
                ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => Ok(Some(elapsed)),
                ErrorKind::TimedOut
                | ErrorKind::HostUnreachable
                | ErrorKind::NetworkUnreachable
                | ErrorKind::NetworkDown => {
                    trace!("{target}: {e}");
                    Ok(None)
                }
                _ => Err(ProbeError::Io {
                    address: address.to_string(),
                    source: e,
                }),
            },
        }
    }
}
