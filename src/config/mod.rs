//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line
//!     → cli.rs (clap parse)
//!     → loader.rs (headers JSON, TLS mode, root directory)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → passed by reference to each subsystem constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once built; nothing mutates it after startup
//! - All fields have defaults so library callers can use struct update syntax
//! - Validation separates syntactic (clap/serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::CliArgs;
pub use loader::ConfigError;
pub use schema::{ServerConfig, TlsMode};
