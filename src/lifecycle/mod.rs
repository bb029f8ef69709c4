//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Probe public port → Probe internal port → TLS → Content listener
//!     → Sidecar + watcher → Address report (banner.rs)
//!
//! Shutdown (shutdown.rs):
//!     Signal received (signals.rs) → Trigger broadcast → Listeners stop
//! ```
//!
//! # Design Decisions
//! - Ordered startup; listeners open last
//! - No drain deadline: open connections may be cut on exit

pub mod banner;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use banner::Scheme;
pub use shutdown::Shutdown;
pub use startup::{start, BoundPorts, RunningServer, StartupError};
