//! live-serve: local development server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────── live-serve ────────────────────────┐
//!                     │                                                            │
//!   Browser ──────────┼─▶ sidecar (public port)  ──▶  content server (internal)    │
//!     ▲               │      │  inject client            │                         │
//!     │  ws "reload"  │      │                           ├─▶ static files (root)   │
//!     └───────────────┼──────┤                           └─▶ proxy target (miss)   │
//!                     │      ▲                                                     │
//!                     │   file watcher                                             │
//!                     │                                                            │
//!                     │  With --noHot the content server takes the public port     │
//!                     │  directly, optionally behind TLS.                          │
//!                     └────────────────────────────────────────────────────────────┘
//! ```

use std::process::ExitCode;

use clap::Parser;

use live_serve::config::{loader, CliArgs};
use live_serve::lifecycle::{self, signals};
use live_serve::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    logging::init(args.debug);

    let config = match loader::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("live-serve: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!(
        port = config.port,
        root = %config.root.display(),
        proxy = ?config.proxy,
        live_reload = config.live_reload_enabled(),
        tls = ?config.tls,
        "Configuration loaded"
    );

    let server = match lifecycle::start(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("live-serve: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = server.shutdown_handle();
    tokio::select! {
        result = server.wait() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server stopped with an error");
                return ExitCode::FAILURE;
            }
        }
        _ = signals::wait_for_termination() => {
            shutdown.trigger();
        }
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
