//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware pipeline, route lookup)
//!     → request.rs (request ID, rewrite for the upstream)
//!     → proxy.rs (plain exchange) | websocket.rs (protocol upgrade)
//!     → response.rs (gateway errors as status codes)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use proxy::ProxyClient;
pub use request::X_REQUEST_ID;
pub use response::GatewayError;
pub use server::{GatewayServer, ServerError};
