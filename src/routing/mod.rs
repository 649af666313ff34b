//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (route lookup)
//!     → matcher.rs (segment-aware prefix check)
//!     → Return: matched RouteEntry or NotFound
//!
//! Route Compilation (at startup):
//!     ServicesConfig
//!     → parse upstream addresses
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Prefixes are disjoint, so first match is the only match
//! - The full original path is forwarded; prefixes are never stripped

pub mod matcher;
pub mod router;

pub use router::{NotFound, RouteEntry, RouteTable, Upstream, UpstreamParseError};
