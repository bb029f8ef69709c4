//! Live-reload sidecar on the public port.
//!
//! # Responsibilities
//! - Forward every request to the content server on the internal port
//! - Inject the reload client into HTML responses on the way back
//! - Serve the client script and the WebSocket it connects to
//! - Push reload events to every connected browser
//!
//! # Data Flow
//! ```text
//! Browser ──▶ sidecar (public port) ──▶ content server (internal port)
//!    ▲              │
//!    └── ws push ◀──┴── FileWatcher events (broadcast)
//! ```
//!
//! # Design Decisions
//! - The sidecar only knows the internal address; no other shared state
//! - Each browser gets its own task and broadcast receiver; a failed send
//!   ends that session only
//! - Compressed HTML is passed through as-is; `Accept-Encoding` is dropped
//!   on the way in so that is rare
//! - Only full `200` HTML bodies are rewritten; a `206` keeps its
//!   `Content-Range` and bytes untouched

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::http::proxy::{
    downstream_response, gateway_status, strip_hop_by_hop, upstream_body, upstream_client,
};
use crate::lifecycle::Shutdown;
use crate::reload::inject::{inject_script, CLIENT_SCRIPT, CLIENT_SCRIPT_PATH, SOCKET_PATH};
use crate::reload::watcher::ReloadEvent;

/// State shared by the sidecar handlers.
pub struct SidecarState {
    internal: SocketAddr,
    client: reqwest::Client,
    events: broadcast::Sender<ReloadEvent>,
    shutdown: Shutdown,
}

/// Front-facing live-reload server.
pub struct Sidecar {
    router: Router,
    internal: SocketAddr,
}

impl Sidecar {
    /// Create a sidecar forwarding to the content server at `internal`.
    ///
    /// An unspecified bind address is reached through loopback.
    pub fn new(
        internal: SocketAddr,
        events: broadcast::Sender<ReloadEvent>,
        shutdown: Shutdown,
    ) -> Result<Self, reqwest::Error> {
        let internal = if internal.ip().is_unspecified() {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), internal.port())
        } else {
            internal
        };

        let state = Arc::new(SidecarState {
            internal,
            client: upstream_client()?,
            events,
            shutdown,
        });

        Ok(Self {
            router: Self::build_router(state),
            internal,
        })
    }

    fn build_router(state: Arc<SidecarState>) -> Router {
        Router::new()
            .route(SOCKET_PATH, get(socket_handler))
            .route(CLIENT_SCRIPT_PATH, get(client_script))
            .fallback(forward_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    pub fn internal(&self) -> SocketAddr {
        self.internal
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on the public listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, internal = %self.internal, "Live-reload sidecar starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(address = %addr, "Live-reload sidecar stopped");
        Ok(())
    }
}

async fn client_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_SCRIPT,
    )
}

async fn socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SidecarState>>,
) -> Response {
    let events = state.events.subscribe();
    let shutdown = state.shutdown.subscribe();
    ws.on_upgrade(move |socket| client_session(socket, events, shutdown))
}

/// One connected browser.
async fn client_session(
    socket: WebSocket,
    mut events: broadcast::Receiver<ReloadEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!("Browser connected for live reload");

    loop {
        tokio::select! {
            event = events.recv() => {
                let message = match event {
                    Ok(ReloadEvent::Reload) => "reload",
                    Ok(ReloadEvent::Css(_)) => "css",
                    // Missed events; a full reload covers all of them.
                    Err(broadcast::error::RecvError::Lagged(_)) => "reload",
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if sender.send(Message::Text(message.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = shutdown.recv() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    tracing::debug!("Browser disconnected from live reload");
}

/// Forward to the content server, injecting the client into HTML.
async fn forward_handler(
    State(state): State<Arc<SidecarState>>,
    request: Request<Body>,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("http://{}{}", state.internal, path_and_query);

    strip_hop_by_hop(&mut parts.headers);
    parts.headers.remove(header::HOST);
    parts.headers.remove(header::ACCEPT_ENCODING);

    let head_request = parts.method == Method::HEAD;
    let mut builder = state
        .client
        .request(parts.method, &url)
        .headers(parts.headers);
    if let Some(body) = upstream_body(body) {
        builder = builder.body(body);
    }

    let upstream = match builder.send().await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Content server request failed");
            return (gateway_status(&e), "Content server unavailable").into_response();
        }
    };

    // Partial and conditional replies keep their upstream framing.
    if upstream.status() != StatusCode::OK || !is_injectable(upstream.headers()) {
        return downstream_response(upstream);
    }

    if head_request {
        // The injected length is unknown without the body.
        let mut response = downstream_response(upstream);
        response.headers_mut().remove(header::CONTENT_LENGTH);
        return response;
    }

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Failed to read HTML from content server");
            return (StatusCode::BAD_GATEWAY, "Content server unavailable").into_response();
        }
    };

    let body = match inject_script(&bytes) {
        Some(injected) => {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(injected.len()));
            Body::from(injected)
        }
        None => Body::from(bytes),
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Uncompressed HTML can be rewritten; anything else streams through.
fn is_injectable(headers: &HeaderMap) -> bool {
    let html = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("text/html"));

    let encoded = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.eq_ignore_ascii_case("identity"));

    html && !encoded
}
