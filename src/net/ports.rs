//! Port probing.
//!
//! # Responsibilities
//! - Find the lowest free port at or above a requested one
//! - Retry only on "address in use"; every other bind error is fatal
//! - Give up after a bounded number of attempts
//!
//! # Design Decisions
//! - A probe binds and immediately releases the port. Nothing is reserved, so
//!   another process can still take the port before the real listener binds.
//!   Callers treat the result as best-effort.
//! - The `Probe` trait is the seam between the search loop and the OS.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};

/// Errors from port negotiation.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Every candidate port was in use.
    #[error("no available port in {from}-{to} after {attempts} attempts")]
    NoPortAvailable { from: u16, to: u16, attempts: u32 },

    /// A bind failed for a reason other than the port being in use.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
}

/// Checks whether a single port can be bound right now.
pub trait Probe {
    /// Bind and release `port`. `Ok` means the port was free.
    fn probe(&self, port: u16) -> io::Result<()>;
}

/// Probes by opening and dropping a real TCP listener.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    host: IpAddr,
}

impl TcpProbe {
    pub fn new(host: IpAddr) -> Self {
        Self { host }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

impl Probe for TcpProbe {
    fn probe(&self, port: u16) -> io::Result<()> {
        let listener = TcpListener::bind(SocketAddr::new(self.host, port))?;
        drop(listener);
        Ok(())
    }
}

/// Sequential port search over a `Probe`.
#[derive(Debug, Clone)]
pub struct PortProber<P = TcpProbe> {
    probe: P,
    max_attempts: u32,
}

impl<P: Probe> PortProber<P> {
    pub fn new(probe: P, max_attempts: u32) -> Self {
        Self {
            probe,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Return the lowest free port in `start..start + max_attempts`.
    ///
    /// Each call is an independent probe; two calls in a row (public port,
    /// then internal port) do not interfere with each other.
    pub fn find_available(&self, start: u16) -> Result<u16, PortError> {
        let mut port = start;
        let mut last_tried = start;
        let mut attempts = 0;

        while attempts < self.max_attempts {
            attempts += 1;
            last_tried = port;
            match self.probe.probe(port) {
                Ok(()) => {
                    if port != start {
                        tracing::info!(requested = start, port, "Requested port busy, using next free port");
                    }
                    return Ok(port);
                }
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    tracing::debug!(port, "Port in use");
                    match port.checked_add(1) {
                        Some(next) => port = next,
                        None => break,
                    }
                }
                Err(source) => return Err(PortError::Bind { port, source }),
            }
        }

        Err(PortError::NoPortAvailable {
            from: start,
            to: last_tried,
            attempts,
        })
    }
}
