//! Upstream forwarding for plain request/response exchanges.
//!
//! # Responsibilities
//! - Send the rewritten request to the route's upstream, exactly once
//! - Bound the wait for response headers
//! - Stream the upstream body back without buffering it
//! - Classify transport failures into `GatewayError`
//!
//! # Design Decisions
//! - One pooled hyper client shared by every connection
//! - When the client goes away hyper drops the response body, which drops
//!   the upstream body and closes that connection

use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::Response as HttpResponse,
    response::Response,
};
use futures_util::TryStreamExt;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::TimeoutConfig;
use crate::http::request::{remove_hop_by_hop_headers, upstream_request};
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::routing::Upstream;

/// Shared upstream client. Cloning shares the connection pool.
#[derive(Clone)]
pub struct ProxyClient {
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
}

impl ProxyClient {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            upstream_timeout: timeouts.upstream(),
        }
    }

    /// Forward a plain request and relay the upstream response.
    pub async fn forward(
        &self,
        request: Request,
        upstream: &Upstream,
    ) -> Result<Response, GatewayError> {
        let path = request.uri().path().to_string();
        let (parts, body) = request.into_parts();
        let outbound = upstream_request(parts, body, upstream, false).map_err(|e| {
            GatewayError::BadRequest {
                path,
                reason: e.to_string(),
            }
        })?;

        let response = self.send(outbound, upstream).await?;
        Ok(relay_response(response, upstream))
    }

    /// Send `request` and wait for response headers within the upstream timeout.
    pub(crate) async fn send(
        &self,
        request: Request,
        upstream: &Upstream,
    ) -> Result<HttpResponse<Incoming>, GatewayError> {
        match tokio::time::timeout(self.upstream_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(classify(&e, upstream)),
            Err(_) => Err(GatewayError::Timeout {
                upstream: upstream.to_string(),
                timeout: self.upstream_timeout,
            }),
        }
    }
}

/// Turn an upstream response into a client response with a streaming body.
pub(crate) fn relay_response(response: HttpResponse<Incoming>, upstream: &Upstream) -> Response {
    let (mut parts, body) = response.into_parts();
    remove_hop_by_hop_headers(&mut parts.headers, false);

    let upstream = upstream.to_string();
    let stream = Body::new(body).into_data_stream().map_err(move |e| {
        let error = GatewayError::StreamFailed {
            upstream: upstream.clone(),
            reason: e.to_string(),
        };
        tracing::error!(error = %error, "Upstream body aborted mid-stream");
        metrics::record_upstream_error(error.kind());
        e
    });

    Response::from_parts(parts, Body::from_stream(stream))
}

/// Map a client error onto the gateway taxonomy.
fn classify(error: &hyper_util::client::legacy::Error, upstream: &Upstream) -> GatewayError {
    let reason = source_chain(error);
    if error.is_connect() {
        GatewayError::Unreachable {
            upstream: upstream.to_string(),
            reason,
        }
    } else {
        GatewayError::StreamFailed {
            upstream: upstream.to_string(),
            reason,
        }
    }
}

fn source_chain(error: &dyn std::error::Error) -> String {
    let mut reason = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    reason
}
