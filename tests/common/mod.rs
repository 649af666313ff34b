//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use campus_gateway::config::{GatewayConfig, ServicesConfig};
use campus_gateway::security::FixedWindowLimiter;
use campus_gateway::{GatewayServer, Shutdown};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// A gateway running in the background on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub limiter: Option<FixedWindowLimiter>,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config routing every service to `upstream`, with short timeouts.
pub fn config_for(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.services = ServicesConfig::all(upstream.to_string());
    config.timeouts.connect_secs = 1;
    config.timeouts.upstream_secs = 5;
    config
}

pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let server = GatewayServer::new(config).unwrap();
    let limiter = server.rate_limiter().cloned();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestGateway {
        addr,
        limiter,
        shutdown,
    }
}

/// HTTP client that never reuses connections or honours proxy env vars.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Upstream that describes the request it received.
///
/// Paths ending in `/status/500` answer 500. The upstream also sets headers
/// the gateway is expected to strip or override.
pub async fn start_echo_backend() -> SocketAddr {
    async fn echo(request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string()
        };

        let status = if parts.uri.path().ends_with("/status/500") {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        };
        let text = format!(
            "{} {}\nhost: {}\nx-request-id: {}\n\n{}",
            parts.method,
            parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
            header("host"),
            header("x-request-id"),
            String::from_utf8_lossy(&body),
        );

        (
            status,
            [
                (header::CONTENT_TYPE, "text/plain"),
                (header::X_FRAME_OPTIONS, "ALLOWALL"),
                (header::HeaderName::from_static("x-powered-by"), "Express"),
                (header::HeaderName::from_static("x-upstream"), "echo"),
            ],
            Body::from(text),
        )
            .into_response()
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Upstream that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Observations from the WebSocket upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    Received(String),
    Closed,
}

/// WebSocket upstream: greets with `welcome`, echoes text as `echo: <text>`,
/// and closes the session when it receives `bye`.
pub async fn start_ws_backend() -> (SocketAddr, mpsc::UnboundedReceiver<WsEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let events = events_tx.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let _ = ws.send(Message::text("welcome")).await;

                while let Some(Ok(message)) = ws.next().await {
                    match message {
                        Message::Text(text) if text.as_str() == "bye" => {
                            let _ = events.send(WsEvent::Received("bye".into()));
                            let _ = ws.close(None).await;
                            break;
                        }
                        Message::Text(text) => {
                            let _ = events.send(WsEvent::Received(text.as_str().to_string()));
                            let _ = ws.send(Message::text(format!("echo: {}", text.as_str()))).await;
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                let _ = events.send(WsEvent::Closed);
            });
        }
    });

    (addr, events_rx)
}

/// Wait for the next event, failing the test if none arrives in time.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<WsEvent>) -> WsEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for upstream event")
        .expect("upstream event channel closed")
}
