//! Local development server library.
//!
//! Serves a directory over HTTP, forwards static misses to an optional proxy
//! target, and optionally fronts everything with a live-reload sidecar or
//! terminates TLS.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod reload;

pub use config::{ServerConfig, TlsMode};
pub use http::ContentServer;
pub use lifecycle::{start, RunningServer, Shutdown};
