//! Security response headers.
//!
//! # Responsibilities
//! - Hold the fixed, ordered set of hardening headers
//! - Stamp it onto every response leaving the gateway, proxied or synthesized
//! - Remove headers that advertise the upstream stack
//!
//! # Design Decisions
//! - The set is built once at startup and shared read-only
//! - Values overwrite whatever the upstream sent for the same name

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
};

static X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Ordered header name → value pairs applied to every response.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    /// Apply the set to `headers`, replacing any existing values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.remove(&X_POWERED_BY);
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter().map(|(n, v)| (n, v))
    }

}

impl Default for SecurityHeaders {
    fn default() -> Self {
        let pairs: [(HeaderName, &'static str); 12] = [
            (
                header::CONTENT_SECURITY_POLICY,
                "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
                 form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
                 object-src 'none';script-src 'self';script-src-attr 'none';\
                 style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
            ),
            (HeaderName::from_static("cross-origin-opener-policy"), "same-origin"),
            (HeaderName::from_static("cross-origin-resource-policy"), "same-origin"),
            (HeaderName::from_static("origin-agent-cluster"), "?1"),
            (header::REFERRER_POLICY, "no-referrer"),
            (header::STRICT_TRANSPORT_SECURITY, "max-age=15552000; includeSubDomains"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::X_DNS_PREFETCH_CONTROL, "off"),
            (HeaderName::from_static("x-download-options"), "noopen"),
            (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
            (HeaderName::from_static("x-permitted-cross-domain-policies"), "none"),
            (header::X_XSS_PROTECTION, "0"),
        ];

        Self {
            headers: pairs
                .into_iter()
                .map(|(name, value)| (name, HeaderValue::from_static(value)))
                .collect(),
        }
    }
}

/// Response mapper installed outermost in the pipeline so early rejections
/// (404, 429) are covered as well as proxied responses.
pub async fn apply_security_headers(
    State(policy): State<Arc<SecurityHeaders>>,
    mut response: Response,
) -> Response {
    policy.apply(response.headers_mut());
    response
}
