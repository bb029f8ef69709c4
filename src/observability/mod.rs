//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems emit `tracing` events with structured fields
//!     → logging.rs (fmt layer, EnvFilter)
//!     → stderr
//! ```
//!
//! The address report is user output and goes to stdout instead
//! (see `lifecycle::banner`).

pub mod logging;
