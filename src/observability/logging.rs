//! Structured logging.
//!
//! # Design Decisions
//! - Uses the tracing crate with a plain fmt layer
//! - `RUST_LOG` wins over the `--debug` defaults

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used without `--debug`.
pub const DEFAULT_FILTER: &str = "live_serve=info,tower_http=warn";

/// Filter used with `--debug`: per-request proxy logs and request spans.
pub const DEBUG_FILTER: &str = "live_serve=debug,tower_http=debug";

/// Pick the default directive set for the debug flag.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        DEBUG_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Install the global subscriber. Call once, before startup.
pub fn init(debug: bool) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug).into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
