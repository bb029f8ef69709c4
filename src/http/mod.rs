//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, single fallback handler)
//!     → static_files.rs (Hit | Redirect | Pass)
//!     → proxy.rs on Pass (rewrite headers, forward, stream back)
//!     → 404 on Pass when no proxy target is configured
//!     → Send to client
//! ```

pub mod proxy;
pub mod server;
pub mod static_files;

pub use proxy::{ProxyForwarder, ProxyTarget};
pub use server::ContentServer;
pub use static_files::{Resolution, StaticResolver};
