//! API gateway for the campus attendance platform.
//!
//! Sits in front of the face recognition, user management, auth, attendance,
//! notification and analytics services. Every request passes through the
//! security header policy and a per-client rate limiter, is routed by path
//! prefix, and is relayed to its upstream (WebSocket upgrades included).

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
