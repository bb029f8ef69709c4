//! Configuration schema definitions.
//!
//! `ServerConfig` is built once at startup (from the command line or by a
//! library caller) and then shared read-only, usually behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Default port the server tries first.
pub const DEFAULT_PORT: u16 = 8080;

/// Default ceiling on consecutive in-use ports the prober will skip.
pub const DEFAULT_MAX_PORT_ATTEMPTS: u32 = 20;

/// Root configuration for the development server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port requested by the user. The bound port may be higher.
    pub port: u16,

    /// Address both listeners bind on.
    pub host: IpAddr,

    /// Directory served as the static root.
    pub root: PathBuf,

    /// Upstream origin for requests that miss the static root.
    pub proxy: Option<String>,

    /// Headers overlaid on every proxied request.
    pub headers: BTreeMap<String, String>,

    /// Disable the live-reload sidecar.
    pub no_hot: bool,

    /// Extra watcher exclusions, added to the built-in ones.
    pub ignore: Vec<String>,

    /// TLS termination mode (only honoured when live reload is off).
    pub tls: TlsMode,

    /// Verbose per-request diagnostics.
    pub debug: bool,

    /// Maximum number of ports the prober tries before giving up.
    pub max_port_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            proxy: None,
            headers: BTreeMap::new(),
            no_hot: false,
            ignore: Vec::new(),
            tls: TlsMode::Disabled,
            debug: false,
            max_port_attempts: DEFAULT_MAX_PORT_ATTEMPTS,
        }
    }
}

impl ServerConfig {
    /// Whether the live-reload sidecar fronts the content server.
    pub fn live_reload_enabled(&self) -> bool {
        !self.no_hot
    }

    /// Whether the content listener terminates TLS.
    ///
    /// TLS is only wired up when live reload is disabled; with the sidecar in
    /// front, the user-facing listener stays plain HTTP.
    pub fn tls_active(&self) -> bool {
        self.tls.is_enabled() && !self.live_reload_enabled()
    }
}

/// How the content listener obtains its certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    /// Plain HTTP.
    #[default]
    Disabled,

    /// Generate a fresh self-signed pair on every start.
    SelfSigned,

    /// Load a PEM key and certificate, falling back to self-signed on failure.
    Files {
        key_path: PathBuf,
        cert_path: PathBuf,
    },
}

impl TlsMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, TlsMode::Disabled)
    }
}
