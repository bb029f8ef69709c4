//! Live-reload subsystem.
//!
//! # Data Flow
//! ```text
//! filesystem change
//!     → watcher.rs (notify, extension + ignore.rs filter, debounce)
//!     → broadcast::Sender<ReloadEvent>
//!     → sidecar.rs (one WebSocket session per browser)
//!     → client script (injected by inject.rs) reloads the page
//! ```
//!
//! # Design Decisions
//! - Lifecycle is Stopped → Watching; there is no pause or resume
//! - A watcher that fails to start is logged and skipped; the sidecar still
//!   serves and injects, browsers just never get a push

pub mod ignore;
pub mod inject;
pub mod sidecar;
pub mod watcher;

pub use ignore::IgnoreSet;
pub use sidecar::Sidecar;
pub use watcher::{FileWatcher, ReloadEvent};
