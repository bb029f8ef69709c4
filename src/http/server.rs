//! Content server: static files with proxy fallthrough.
//!
//! # Responsibilities
//! - Build the Axum router for the content listener
//! - Serve static hits with `ServeFile` (content type, ranges, conditionals)
//! - Hand every static miss to the proxy forwarder, or answer 404 without one
//! - Run on a plain listener or behind TLS until shutdown

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::{services::ServeFile, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::proxy::{ProxyError, ProxyForwarder};
use crate::http::static_files::{Resolution, StaticResolver};

/// Errors building the content server.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("static root {path} is not usable: {source}")]
    Root {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

/// Application state injected into the content handler.
#[derive(Clone)]
pub struct ContentState {
    pub statics: Arc<StaticResolver>,
    pub proxy: Option<Arc<ProxyForwarder>>,
}

/// The static + proxy handler chain.
pub struct ContentServer {
    router: Router,
}

impl ContentServer {
    /// Build the handler chain from configuration.
    pub fn new(config: &ServerConfig) -> Result<Self, ContentError> {
        let statics = StaticResolver::new(&config.root).map_err(|source| ContentError::Root {
            path: config.root.display().to_string(),
            source,
        })?;

        let proxy = match &config.proxy {
            Some(target) => {
                let forwarder = ProxyForwarder::new(target, &config.headers, config.debug)?;
                tracing::info!(target = %forwarder.target().origin(), "Proxying static misses");
                Some(Arc::new(forwarder))
            }
            None => None,
        };

        let state = ContentState {
            statics: Arc::new(statics),
            proxy,
        };

        Ok(Self {
            router: Self::build_router(state),
        })
    }

    fn build_router(state: ContentState) -> Router {
        Router::new()
            .fallback(content_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on an already bound listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Content server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(address = %addr, "Content server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until shutdown.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: axum_server::tls_rustls::RustlsConfig,
        handle: axum_server::Handle,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let stopper = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            stopper.shutdown();
        });

        tracing::info!(address = %addr, "Content server starting (TLS)");
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!(address = %addr, "Content server stopped");
        Ok(())
    }
}

/// Static lookup first; on a miss, the proxy (if any).
async fn content_handler(State(state): State<ContentState>, request: Request<Body>) -> Response {
    let method = request.method().clone();

    if method == Method::GET || method == Method::HEAD {
        match state.statics.resolve(request.uri().path()).await {
            Resolution::Hit(path) => return serve_file(&path, request).await,
            Resolution::Redirect(location) => return redirect(&location, &request),
            Resolution::Pass => {}
        }
    }

    match &state.proxy {
        Some(proxy) => proxy.forward(request).await,
        None => {
            tracing::debug!(method = %method, path = %request.uri().path(), "No static match");
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}

async fn serve_file(path: &std::path::Path, request: Request<Body>) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

fn redirect(location: &str, request: &Request<Body>) -> Response {
    let location = match request.uri().query() {
        Some(query) => format!("{location}?{query}"),
        None => location.to_string(),
    };

    let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
    if let Ok(value) = header::HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn server(dir: &std::path::Path) -> ContentServer {
        let config = ServerConfig {
            root: dir.to_path_buf(),
            ..ServerConfig::default()
        };
        ContentServer::new(&config).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn serves_file_with_content_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();

        let response = server(dir.path()).router().oneshot(get("/style.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"body{}");
    }

    #[tokio::test]
    async fn miss_without_proxy_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = server(dir.path()).router().oneshot(get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn directory_redirect_keeps_query() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/index.html"), "docs").unwrap();

        let response = server(dir.path()).router().oneshot(get("/docs?tab=1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "/docs/?tab=1");
    }

    #[tokio::test]
    async fn post_never_hits_static_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("form"), "static").unwrap();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/form")
            .body(Body::from("a=1"))
            .unwrap();
        let response = server(dir.path()).router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn missing_root_is_an_error() {
        let config = ServerConfig {
            root: "/definitely/not/here".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            ContentServer::new(&config),
            Err(ContentError::Root { .. })
        ));
    }
}
