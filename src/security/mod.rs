//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP fixed-window admission)
//!     → Pass to routing
//!
//! Outgoing response (every outcome):
//!     → headers.rs (fixed hardening header set)
//! ```
//!
//! # Design Decisions
//! - The limiter runs before route lookup, so unknown paths count against the quota
//! - Header injection wraps the limiter, so rejections carry the headers too

pub mod headers;
pub mod rate_limit;

pub use headers::SecurityHeaders;
pub use rate_limit::{ClientKey, Decision, FixedWindowLimiter};
