//! Per-client fixed-window rate limiting.
//!
//! Counters live in a sharded `DashMap`, so requests from different clients
//! only contend when they hash to the same shard, while requests from the
//! same client are serialized by the shard lock held across the
//! read-modify-write. Counting is increment-then-check: a rejected request
//! still bumps the counter, so the stored count equals the number of
//! requests seen in the window.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::http::response::GatewayError;
use crate::observability::metrics;

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Identity used for rate accounting: the peer IP.
pub type ClientKey = IpAddr;

/// Derive the client key from a peer address.
///
/// IPv4-mapped IPv6 peers (`::ffff:a.b.c.d`) share a key with plain IPv4.
pub fn client_key(addr: SocketAddr) -> ClientKey {
    addr.ip().to_canonical()
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit { remaining: u64, reset_after: Duration },
    Reject { retry_after: Duration },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct RateCounter {
    window_start: Instant,
    count: u64,
}

impl RateCounter {
    /// A window whose end is not representable never expires.
    fn is_expired(&self, window: Duration, now: Instant) -> bool {
        self.window_start
            .checked_add(window)
            .is_some_and(|window_end| now >= window_end)
    }
}

/// In-memory fixed-window limiter, cheap to clone.
#[derive(Debug, Clone)]
pub struct FixedWindowLimiter {
    inner: Arc<LimiterInner>,
}

#[derive(Debug)]
struct LimiterInner {
    window: Duration,
    max_requests: u64,
    counters: DashMap<ClientKey, RateCounter>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                window,
                max_requests,
                counters: DashMap::new(),
            }),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.window(), config.max_requests)
    }

    pub fn max_requests(&self) -> u64 {
        self.inner.max_requests
    }

    /// Count one request from `key` at `now` and decide whether it may pass.
    pub fn admit(&self, key: ClientKey, now: Instant) -> Decision {
        let window = self.inner.window;
        let mut counter = self.inner.counters.entry(key).or_insert(RateCounter {
            window_start: now,
            count: 0,
        });

        if counter.is_expired(window, now) {
            counter.window_start = now;
            counter.count = 1;
        } else {
            counter.count = counter.count.saturating_add(1);
        }

        let reset_after = match counter.window_start.checked_add(window) {
            Some(window_end) => window_end.saturating_duration_since(now),
            None => window,
        };
        if counter.count <= self.inner.max_requests {
            Decision::Admit {
                remaining: self.inner.max_requests - counter.count,
                reset_after,
            }
        } else {
            Decision::Reject { retry_after: reset_after }
        }
    }

    /// Requests counted for `key` in its current window, if it is tracked.
    pub fn count(&self, key: ClientKey) -> Option<u64> {
        self.inner.counters.get(&key).map(|c| c.count)
    }

    /// Number of client keys currently holding a counter.
    pub fn tracked_clients(&self) -> usize {
        self.inner.counters.len()
    }

    /// Drop every counter whose window closed at or before `now`.
    ///
    /// An expired counter would be reset on its next use anyway, so this
    /// never changes an admission outcome. Returns the number removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let window = self.inner.window;
        let before = self.inner.counters.len();
        self.inner
            .counters
            .retain(|_, counter| !counter.is_expired(window, now));
        before.saturating_sub(self.inner.counters.len())
    }

    /// Run `sweep` every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep(Instant::now());
                        if removed > 0 {
                            tracing::debug!(
                                removed,
                                tracked = limiter.tracked_clients(),
                                "Evicted expired rate counters"
                            );
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

/// Middleware enforcing the limiter on every request before routing.
pub async fn rate_limit_middleware(
    State(limiter): State<FixedWindowLimiter>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let key = client_key(addr);
    let decision = limiter.admit(key, start);

    let mut response = match decision {
        Decision::Admit { .. } => next.run(request).await,
        Decision::Reject { retry_after } => {
            tracing::warn!(
                client = %key,
                path = %request.uri().path(),
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            metrics::record_rate_limited();
            metrics::record_request(request.method().as_str(), 429, "none", start);
            GatewayError::RateLimited { retry_after }.into_response()
        }
    };

    insert_limit_headers(response.headers_mut(), limiter.max_requests(), decision);
    response
}

fn insert_limit_headers(headers: &mut HeaderMap, limit: u64, decision: Decision) {
    let (remaining, reset_after) = match decision {
        Decision::Admit { remaining, reset_after } => (remaining, reset_after),
        Decision::Reject { retry_after } => (0, retry_after),
    };
    let reset_at = SystemTime::now()
        .checked_add(reset_after)
        .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs().saturating_add(u64::from(d.subsec_nanos() > 0)))
        .unwrap_or(u64::MAX);

    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(reset_at));
}
