//! Startup orchestration.
//!
//! # Responsibilities
//! - Negotiate the public port, and the internal port when live reload is on
//! - Provision TLS for the content listener when it faces the user directly
//! - Bind the content server, then the sidecar in front of it
//! - Report every address the public port answers on
//!
//! # Design Decisions
//! - Fail fast: anything that keeps a listener from opening is fatal
//! - Steps run strictly in order, never concurrently
//! - Optional enhancements degrade instead of failing (certificate source,
//!   file watcher)
//! - The sidecar knows the internal address and nothing else

use std::io;
use std::net::SocketAddr;

use futures_util::future::try_join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::http::server::{ContentError, ContentServer};
use crate::lifecycle::banner::{self, Scheme};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::listener;
use crate::net::ports::{PortError, PortProber, TcpProbe};
use crate::net::tls::{self, TlsError};
use crate::reload::{FileWatcher, IgnoreSet, ReloadEvent, Sidecar};

/// Capacity of the reload event channel; slower browsers see `Lagged` and
/// fall back to a full reload.
const RELOAD_CHANNEL_CAPACITY: usize = 16;

/// Fatal startup failures.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Ports the running server holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundPorts {
    /// Reported to the user; the sidecar when live reload is on.
    pub public_port: u16,
    /// Content server behind the sidecar, if any.
    pub internal_port: Option<u16>,
}

impl BoundPorts {
    /// Port the static + proxy chain listens on.
    pub fn content_port(&self) -> u16 {
        self.internal_port.unwrap_or(self.public_port)
    }
}

type ServerTask = JoinHandle<io::Result<()>>;

/// Handle to a started server.
pub struct RunningServer {
    ports: BoundPorts,
    scheme: Scheme,
    urls: Vec<String>,
    shutdown: Shutdown,
    tasks: Vec<ServerTask>,
    watcher: Option<FileWatcher>,
}

impl RunningServer {
    pub fn ports(&self) -> BoundPorts {
        self.ports
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// URLs printed in the address report.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Whether file changes are pushed to browsers.
    pub fn watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// A coordinator handle that outlives [`RunningServer::wait`].
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Ask both listeners to stop accepting.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down");
        self.shutdown.trigger();
    }

    /// Wait for every server task to finish.
    ///
    /// Returns on the first listener that fails; the others are told to stop.
    pub async fn wait(self) -> io::Result<()> {
        let _watcher = self.watcher;
        let tasks = self
            .tasks
            .into_iter()
            .map(|task| async move {
                match task.await {
                    Ok(result) => result,
                    Err(e) => Err(io::Error::other(e)),
                }
            });

        match try_join_all(tasks).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "Server task failed");
                self.shutdown.trigger();
                Err(e)
            }
        }
    }
}

/// Run the startup sequence and return once the listeners are open.
pub async fn start(config: ServerConfig) -> Result<RunningServer, StartupError> {
    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    match launch(&config, &shutdown, &mut tasks).await {
        Ok((ports, scheme, watcher)) => {
            let urls = banner::addresses(scheme, ports.public_port);
            tracing::info!(
                public_port = ports.public_port,
                internal_port = ?ports.internal_port,
                scheme = %scheme,
                root = %config.root.display(),
                "Server ready"
            );
            banner::report(&urls);

            Ok(RunningServer {
                ports,
                scheme,
                urls,
                shutdown,
                tasks,
                watcher,
            })
        }
        Err(e) => {
            // Stop whatever was already spawned.
            shutdown.trigger();
            Err(e)
        }
    }
}

async fn launch(
    config: &ServerConfig,
    shutdown: &Shutdown,
    tasks: &mut Vec<ServerTask>,
) -> Result<(BoundPorts, Scheme, Option<FileWatcher>), StartupError> {
    let prober = PortProber::new(TcpProbe::new(config.host), config.max_port_attempts);

    let public_port = prober.find_available(config.port)?;
    if public_port != config.port {
        tracing::info!(requested = config.port, public_port, "Requested port busy, using next free one");
    }

    let internal_port = if config.live_reload_enabled() {
        let start = public_port
            .checked_add(1)
            .ok_or(PortError::NoPortAvailable {
                from: public_port,
                to: public_port,
                attempts: 0,
            })?;
        Some(prober.find_available(start)?)
    } else {
        None
    };
    let ports = BoundPorts {
        public_port,
        internal_port,
    };

    let tls = if config.tls_active() {
        let pair = tls::provision(&config.tls)?;
        tracing::info!(source = ?pair.source, "TLS certificate ready");
        Some(tls::rustls_config(&pair).await?)
    } else {
        if config.tls.is_enabled() {
            tracing::warn!("HTTPS is only applied with --noHot; serving plain HTTP behind live reload");
        }
        None
    };
    let scheme = if tls.is_some() {
        Scheme::Https
    } else {
        Scheme::Http
    };

    let content = ContentServer::new(config)?;
    let content_port = ports.content_port();

    match tls {
        Some(tls) => {
            let addr = SocketAddr::new(config.host, content_port);
            let handle = axum_server::Handle::new();
            let task = tokio::spawn(content.run_tls(addr, tls, handle.clone(), shutdown.subscribe()));

            if handle.listening().await.is_none() {
                // The server exited before binding; surface its error.
                let source = match task.await {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => io::Error::other("content server exited before listening"),
                    Err(e) => io::Error::other(e),
                };
                return Err(PortError::Bind {
                    port: content_port,
                    source,
                }
                .into());
            }
            tasks.push(task);
        }
        None => {
            let listener = listener::bind(config.host, content_port).await?;
            tasks.push(tokio::spawn(content.run(listener, shutdown.subscribe())));
        }
    }

    let mut watcher = None;
    if let Some(internal_port) = internal_port {
        let (events, _) = broadcast::channel::<ReloadEvent>(RELOAD_CHANNEL_CAPACITY);

        let sidecar = Sidecar::new(
            SocketAddr::new(config.host, internal_port),
            events.clone(),
            shutdown.clone(),
        )?;
        let listener = listener::bind(config.host, public_port).await?;
        tasks.push(tokio::spawn(sidecar.run(listener, shutdown.subscribe())));

        watcher = match FileWatcher::start(&config.root, IgnoreSet::new(&config.ignore), events) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "File watcher unavailable, continuing without live reload");
                None
            }
        };
    }

    Ok((ports, scheme, watcher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn config(root: &std::path::Path, port: u16) -> ServerConfig {
        ServerConfig {
            port,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            root: root.to_path_buf(),
            ..ServerConfig::default()
        }
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn content_port_prefers_internal() {
        let ports = BoundPorts {
            public_port: 8080,
            internal_port: Some(8081),
        };
        assert_eq!(ports.content_port(), 8081);

        let ports = BoundPorts {
            public_port: 8080,
            internal_port: None,
        };
        assert_eq!(ports.content_port(), 8080);
    }

    #[tokio::test]
    async fn no_hot_binds_a_single_port() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), free_port());
        config.no_hot = true;

        let server = start(config).await.unwrap();
        assert_eq!(server.ports().internal_port, None);
        assert_eq!(server.scheme(), Scheme::Http);
        assert!(!server.watching());
        server.shutdown();
    }

    #[tokio::test]
    async fn live_reload_binds_two_distinct_ports() {
        let dir = tempfile::tempdir().unwrap();
        let server = start(config(dir.path(), free_port())).await.unwrap();

        let ports = server.ports();
        let internal = ports.internal_port.unwrap();
        assert_ne!(ports.public_port, internal);
        assert!(internal > ports.public_port);
        server.shutdown();
    }

    #[tokio::test]
    async fn busy_requested_port_moves_up() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let mut config = config(dir.path(), port);
        config.no_hot = true;

        let server = start(config).await.unwrap();
        assert!(server.ports().public_port > port);
        server.shutdown();
    }

    #[tokio::test]
    async fn wait_returns_first_failure_and_stops_the_rest() {
        let shutdown = Shutdown::new();
        let mut stop = shutdown.subscribe();
        let content: ServerTask = tokio::spawn(async move {
            let _ = stop.recv().await;
            Ok(())
        });
        let sidecar: ServerTask = tokio::spawn(async { Err(io::Error::other("accept failed")) });

        let server = RunningServer {
            ports: BoundPorts {
                public_port: 8080,
                internal_port: Some(8081),
            },
            scheme: Scheme::Http,
            urls: Vec::new(),
            shutdown: shutdown.clone(),
            tasks: vec![content, sidecar],
            watcher: None,
        };

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), server.wait())
            .await
            .expect("wait blocked on the healthy listener");
        assert_eq!(result.unwrap_err().to_string(), "accept failed");

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(shutdown.receiver_count(), 0);
    }

    #[tokio::test]
    async fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir.path().join("nope"), free_port());
        config.no_hot = true;

        assert!(matches!(start(config).await, Err(StartupError::Content(_))));
    }
}
