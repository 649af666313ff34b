//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Detect protocol-upgrade requests
//! - Replay the handshake against the upstream
//! - Once both sides have switched, relay raw bytes in both directions
//!
//! # Data Flow
//! ```text
//! Client ←──── upgraded TCP stream ────→ Gateway ←──── upgraded TCP stream ────→ Upstream
//! ```
//!
//! # Design Decisions
//! - Byte-level relay: frames, pings and close frames pass through untouched
//! - The first side to finish (EOF or error) ends the session and both
//!   connections are dropped, so no half-open socket outlives its peer
//! - A non-101 upstream answer is relayed like any plain response

use std::io;

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::http::proxy::{relay_response, ProxyClient};
use crate::http::request::upstream_request;
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::routing::Upstream;

/// True if the request asks to switch protocols.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && headers.contains_key(header::UPGRADE)
}

/// Which side ended a relay session, with byte counts per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    ClientClosed { to_upstream: u64 },
    UpstreamClosed { to_client: u64 },
}

/// Copy bytes between `client` and `upstream` until either side finishes.
///
/// The finished direction's write half is shut down, then both streams are
/// dropped on return, closing the other direction too.
pub async fn relay<C, U>(client: C, upstream: U) -> io::Result<RelayOutcome>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut upstream_read, mut upstream_write) = tokio::io::split(upstream);

    let client_to_upstream = async {
        let n = tokio::io::copy(&mut client_read, &mut upstream_write).await?;
        let _ = upstream_write.shutdown().await;
        Ok::<_, io::Error>(n)
    };
    let upstream_to_client = async {
        let n = tokio::io::copy(&mut upstream_read, &mut client_write).await?;
        let _ = client_write.shutdown().await;
        Ok::<_, io::Error>(n)
    };

    tokio::select! {
        n = client_to_upstream => Ok(RelayOutcome::ClientClosed { to_upstream: n? }),
        n = upstream_to_client => Ok(RelayOutcome::UpstreamClosed { to_client: n? }),
    }
}

/// Forward an upgrade handshake and, on success, spawn the byte relay.
pub async fn relay_upgrade(
    proxy: &ProxyClient,
    mut request: Request,
    upstream: &Upstream,
) -> Result<Response, GatewayError> {
    let path = request.uri().path().to_string();
    let client_upgrade = hyper::upgrade::on(&mut request);

    let (parts, body) = request.into_parts();
    let outbound = upstream_request(parts, body, upstream, true)
        .map_err(|e| GatewayError::BadRequest {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    let mut upstream_response = proxy.send(outbound, upstream).await?;
    if upstream_response.status() != StatusCode::SWITCHING_PROTOCOLS {
        tracing::warn!(
            upstream = %upstream,
            path = %path,
            status = %upstream_response.status(),
            "Upstream declined protocol upgrade"
        );
        return Ok(relay_response(upstream_response, upstream));
    }

    let upstream_upgrade = hyper::upgrade::on(&mut upstream_response);
    let (parts, _) = upstream_response.into_parts();

    let target = upstream.to_string();
    tokio::spawn(async move {
        let (client_io, upstream_io) = match tokio::try_join!(client_upgrade, upstream_upgrade) {
            Ok(pair) => pair,
            Err(e) => {
                let error = GatewayError::StreamFailed {
                    upstream: target,
                    reason: e.to_string(),
                };
                tracing::error!(error = %error, "Protocol upgrade failed");
                metrics::record_upstream_error(error.kind());
                return;
            }
        };

        tracing::debug!(upstream = %target, path = %path, "WebSocket session opened");
        metrics::websocket_opened();
        match relay(TokioIo::new(client_io), TokioIo::new(upstream_io)).await {
            Ok(outcome) => {
                tracing::debug!(upstream = %target, path = %path, ?outcome, "WebSocket session closed");
            }
            Err(e) => {
                let error = GatewayError::StreamFailed {
                    upstream: target,
                    reason: e.to_string(),
                };
                tracing::warn!(error = %error, path = %path, "WebSocket relay aborted");
                metrics::record_upstream_error(error.kind());
            }
        }
        metrics::websocket_closed();
    });

    Ok(Response::from_parts(parts, axum::body::Body::empty()))
}
