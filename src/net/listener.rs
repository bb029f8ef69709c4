//! Listener binding.
//!
//! # Responsibilities
//! - Bind the plain TCP listeners for the content server and the sidecar
//! - Report bind failures with the port that failed

use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;

use crate::net::ports::PortError;

/// Bind a tokio listener on `host:port`.
pub async fn bind(host: IpAddr, port: u16) -> Result<TcpListener, PortError> {
    let addr = SocketAddr::new(host, port);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| PortError::Bind { port, source })?;

    tracing::debug!(address = %addr, "Listener bound");
    Ok(listener)
}
