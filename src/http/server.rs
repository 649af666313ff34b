//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the gateway handler
//! - Wire up middleware: request ID, tracing, security headers, rate limiting
//! - Resolve each request against the route table
//! - Dispatch to the plain or upgrade relay
//! - Run until the shutdown signal fires
//!
//! # Pipeline (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → SecurityHeaders → RateLimit → gateway_handler
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::Request as HttpRequest,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::proxy::ProxyClient;
use crate::http::request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::response::GatewayError;
use crate::http::websocket;
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::routing::{RouteTable, UpstreamParseError};
use crate::security::headers::{apply_security_headers, SecurityHeaders};
use crate::security::rate_limit::{rate_limit_middleware, FixedWindowLimiter};

/// Errors that stop the server from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream: {0}")]
    Upstream(#[from] UpstreamParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub proxy: ProxyClient,
}

/// The gateway: one listening port in front of every backend service.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    limiter: Option<FixedWindowLimiter>,
}

impl GatewayServer {
    /// Build the pipeline from an already validated configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let routes = Arc::new(RouteTable::from_config(&config.services)?);
        for route in routes.routes() {
            tracing::info!(
                service = %route.service,
                prefix = route.matcher.prefix(),
                upstream = %route.target,
                "Route registered"
            );
        }

        let limiter = config
            .rate_limit
            .enabled
            .then(|| FixedWindowLimiter::from_config(&config.rate_limit));

        let state = AppState {
            routes,
            proxy: ProxyClient::new(&config.timeouts),
        };

        let router = Self::build_router(state, limiter.clone(), Arc::new(SecurityHeaders::default()));
        Ok(Self {
            router,
            config,
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        state: AppState,
        limiter: Option<FixedWindowLimiter>,
        headers: Arc<SecurityHeaders>,
    ) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state);

        if let Some(limiter) = limiter {
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuidV4))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &HttpRequest<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id(request.headers()),
                    )
                }))
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
                .layer(middleware::map_response_with_state(headers, apply_security_headers)),
        )
    }

    /// Router with the full pipeline, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared rate limiter, if rate limiting is enabled.
    pub fn rate_limiter(&self) -> Option<&FixedWindowLimiter> {
        self.limiter.as_ref()
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        self.spawn_sweeper(&shutdown);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` with the given TLS material until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!(address = %addr, "Gateway listening (TLS)");

        self.spawn_sweeper(&shutdown);
        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            shutdown::wait(shutdown).await;
            drain.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    fn spawn_sweeper(&self, shutdown: &broadcast::Receiver<()>) {
        if let Some(limiter) = &self.limiter {
            limiter.spawn_sweeper(self.config.rate_limit.sweep_interval(), shutdown.resubscribe());
        }
    }
}

/// Resolves the route and relays the request to its upstream.
async fn gateway_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let id = request_id(request.headers()).to_string();

    let route = match state.routes.resolve(&path) {
        Ok(route) => route,
        Err(_) => {
            tracing::warn!(request_id = %id, path = %path, "No route matched");
            metrics::record_request(&method, 404, "none", start);
            return GatewayError::NotFound { path }.into_response();
        }
    };

    tracing::debug!(
        request_id = %id,
        method = %method,
        path = %path,
        service = %route.service,
        upstream = %route.target,
        "Proxying request"
    );

    let result = if websocket::is_upgrade_request(request.headers()) {
        websocket::relay_upgrade(&state.proxy, request, &route.target).await
    } else {
        state.proxy.forward(request, &route.target).await
    };

    match result {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), route.service.name(), start);
            response
        }
        Err(e) if e.is_upstream() => {
            tracing::error!(
                request_id = %id,
                service = %route.service,
                kind = e.kind(),
                error = %e,
                "Upstream error"
            );
            metrics::record_upstream_error(e.kind());
            metrics::record_request(&method, e.status().as_u16(), route.service.name(), start);
            e.into_response()
        }
        Err(e) => {
            tracing::warn!(
                request_id = %id,
                service = %route.service,
                kind = e.kind(),
                error = %e,
                "Request rejected"
            );
            metrics::record_request(&method, e.status().as_u16(), route.service.name(), start);
            e.into_response()
        }
    }
}
