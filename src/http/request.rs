//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Rewrite the request for its upstream: absolute URI, Host header
//! - Strip hop-by-hop headers that must not cross the proxy
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The path and query are forwarded verbatim, prefix included
//! - Upgrade requests keep `Connection`/`Upgrade` so the upstream can switch protocols

use axum::{
    body::Body,
    http::{
        header, request::Parts, uri::Scheme, HeaderMap, HeaderName, HeaderValue,
        Request, Uri, Version,
    },
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::routing::Upstream;

/// Header carrying the correlation ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Produces a fresh UUID v4 for requests that arrive without an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Read the request ID assigned by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
///
/// With `keep_upgrade`, `Connection` and `Upgrade` survive so a protocol
/// switch can be negotiated end to end.
pub fn remove_hop_by_hop_headers(headers: &mut HeaderMap, keep_upgrade: bool) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        if keep_upgrade && (*name == header::CONNECTION || *name == header::UPGRADE) {
            continue;
        }
        headers.remove(name);
    }
}

/// Rebuild an inbound request so it targets `upstream`.
///
/// Fails only when the original path cannot form a valid absolute URI.
pub fn upstream_request(
    parts: Parts,
    body: Body,
    upstream: &Upstream,
    keep_upgrade: bool,
) -> Result<Request<Body>, axum::http::Error> {
    let Parts {
        method,
        uri,
        mut headers,
        ..
    } = parts;

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(upstream.authority().clone())
        .path_and_query(path_and_query)
        .build()?;

    remove_hop_by_hop_headers(&mut headers, keep_upgrade);
    let host = HeaderValue::from_str(upstream.authority().as_str())?;
    headers.insert(header::HOST, host);

    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .version(Version::HTTP_11)
        .body(body)?;
    *request.headers_mut() = headers;
    Ok(request)
}
