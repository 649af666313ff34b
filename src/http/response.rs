//! Gateway-level errors and their client-facing responses.
//!
//! # Responsibilities
//! - Name every way a request can end without an upstream response
//! - Map each to its status code (400, 404, 429, 502, 504)
//! - Keep upstream details in the logs, not in the response body
//!
//! # Design Decisions
//! - Bodies are short plain text; the security headers are added later by
//!   the outer layer like for any other response
//! - `Retry-After` is whole seconds, rounded up

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Terminal outcome of a request that the gateway answers itself.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No route prefix covers the path.
    #[error("no route matches {path}")]
    NotFound { path: String },

    /// The request could not be rewritten for the upstream.
    #[error("request to {path} cannot be forwarded: {reason}")]
    BadRequest { path: String, reason: String },

    /// Client exceeded its quota for the current window.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Connection refused, DNS failure or connect timeout.
    #[error("upstream {upstream} unreachable: {reason}")]
    Unreachable { upstream: String, reason: String },

    /// Upstream accepted the request but sent no response in time.
    #[error("upstream {upstream} did not respond within {timeout:?}")]
    Timeout { upstream: String, timeout: Duration },

    /// Any other transport failure while exchanging with the upstream.
    #[error("stream with upstream {upstream} failed: {reason}")]
    StreamFailed { upstream: String, reason: String },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Unreachable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::StreamFailed { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::BadRequest { .. } => "bad_request",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::Unreachable { .. } => "unreachable",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::StreamFailed { .. } => "stream_failed",
        }
    }

    /// True for failures caused by the upstream rather than the client.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            GatewayError::Unreachable { .. }
                | GatewayError::Timeout { .. }
                | GatewayError::StreamFailed { .. }
        )
    }

    fn message(&self) -> &'static str {
        match self {
            GatewayError::NotFound { .. } => "No matching route found",
            GatewayError::BadRequest { .. } => "Malformed request",
            GatewayError::RateLimited { .. } => "Too many requests, please try again later.",
            GatewayError::Unreachable { .. } => "Upstream service unreachable",
            GatewayError::Timeout { .. } => "Upstream service timed out",
            GatewayError::StreamFailed { .. } => "Upstream request failed",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message(),
        )
            .into_response();

        if let GatewayError::RateLimited { retry_after } = self {
            let secs = retry_after
                .as_secs()
                .saturating_add(u64::from(retry_after.subsec_nanos() > 0));
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
