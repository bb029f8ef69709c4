//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! requested port
//!     → ports.rs (probe-and-release search for a free port)
//!     → tls.rs (optional certificate pair + rustls config)
//!     → listener.rs (real bind)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Only "address in use" is retried while probing
//! - TLS provisioning degrades to self-signed instead of failing
//! - TLS is optional and handled transparently by axum-server

pub mod listener;
pub mod ports;
pub mod tls;

pub use ports::{PortError, PortProber, Probe, TcpProbe};
pub use tls::{CertificatePair, CertificateSource, TlsError};
