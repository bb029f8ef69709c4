//! Upstream forwarding.
//!
//! # Responsibilities
//! - Parse the proxy target into authority, origin and base path
//! - Rewrite outgoing requests (Host, Origin, user headers)
//! - Forward to the upstream and stream the response back verbatim
//! - Map upstream failures to gateway errors
//!
//! # Design Decisions
//! - Header rewriting is a pure function over request parts so it can be
//!   tested without a network
//! - Host/Origin are set first and user headers applied last, so a user
//!   `host` or `origin` wins
//! - Hop-by-hop headers are stripped in both directions
//! - Redirects from the upstream are passed to the client, not followed

use std::collections::BTreeMap;
use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        request::Parts,
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
};

/// Headers that apply to a single connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

/// Errors building a forwarder.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid proxy target '{0}': {1}")]
    InvalidTarget(String, String),

    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A parsed upstream origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    authority: String,
    origin: String,
    base: String,
}

impl ProxyTarget {
    pub fn parse(raw: &str) -> Result<Self, ProxyError> {
        let invalid = |reason: &str| ProxyError::InvalidTarget(raw.to_string(), reason.to_string());

        let url = url::Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid("scheme must be http or https"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let trimmed = raw.trim_end_matches('/').to_string();
        let base = format!(
            "{}://{}{}",
            url.scheme(),
            authority,
            url.path().trim_end_matches('/')
        );

        Ok(Self {
            authority,
            origin: trimmed,
            base,
        })
    }

    /// Host (and non-default port) of the target, without scheme.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The target URL as configured, used for the `Origin` header.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Absolute upstream URL for a request path and query.
    pub fn upstream_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base, path_and_query)
    }
}

/// Parse user header pairs into a `HeaderMap`.
pub fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ProxyError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ProxyError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| ProxyError::InvalidHeader(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Rewrite an outgoing request for the upstream.
///
/// Points the URI at the target, sets `Host` to the target authority and
/// `Origin` to the target URL, then overlays `extra`.
pub fn rewrite_request(mut parts: Parts, target: &ProxyTarget, extra: &HeaderMap) -> Parts {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    if let Ok(uri) = target.upstream_url(path_and_query).parse::<Uri>() {
        parts.uri = uri;
    }

    strip_hop_by_hop(&mut parts.headers);

    if let Ok(host) = HeaderValue::from_str(target.authority()) {
        parts.headers.insert(header::HOST, host);
    }
    if let Ok(origin) = HeaderValue::from_str(target.origin()) {
        parts.headers.insert(header::ORIGIN, origin);
    }

    for (name, value) in extra {
        parts.headers.insert(name.clone(), value.clone());
    }

    parts
}

/// Convert an axum body for reqwest, skipping the body for empty requests so
/// GETs are not sent chunked.
pub fn upstream_body(body: Body) -> Option<reqwest::Body> {
    if body.is_end_stream() {
        None
    } else {
        Some(reqwest::Body::wrap_stream(body.into_data_stream()))
    }
}

/// Turn an upstream response into a streaming client response.
pub fn downstream_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Map an upstream error to the status returned to the client.
pub fn gateway_status(error: &reqwest::Error) -> StatusCode {
    if error.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    }
}

/// Build the HTTP client used for upstream requests.
pub fn upstream_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
}

/// Forwards static misses to the configured upstream.
#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    target: ProxyTarget,
    extra_headers: HeaderMap,
    client: reqwest::Client,
    debug: bool,
}

impl ProxyForwarder {
    pub fn new(
        target: &str,
        headers: &BTreeMap<String, String>,
        debug: bool,
    ) -> Result<Self, ProxyError> {
        Ok(Self {
            target: ProxyTarget::parse(target)?,
            extra_headers: header_map(headers)?,
            client: upstream_client()?,
            debug,
        })
    }

    pub fn target(&self) -> &ProxyTarget {
        &self.target
    }

    /// Forward a request and return the upstream response or a gateway error.
    pub async fn forward(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let (parts, body) = request.into_parts();
        let parts = rewrite_request(parts, &self.target, &self.extra_headers);

        let method = parts.method.clone();
        let url = parts.uri.to_string();

        if self.debug {
            tracing::info!(method = %method, url = %url, headers = ?parts.headers, "Proxying request");
        }

        let mut builder = self
            .client
            .request(parts.method, &url)
            .headers(parts.headers);
        if let Some(body) = upstream_body(body) {
            builder = builder.body(body);
        }

        match builder.send().await {
            Ok(upstream) => {
                if self.debug {
                    tracing::info!(
                        method = %method,
                        url = %url,
                        status = %upstream.status(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Upstream responded"
                    );
                }
                downstream_response(upstream)
            }
            Err(e) => {
                let status = gateway_status(&e);
                tracing::error!(method = %method, url = %url, error = %e, "Upstream request failed");
                (status, "Upstream request failed").into_response()
            }
        }
    }
}
