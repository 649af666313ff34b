//! Route lookup and upstream targets.
//!
//! # Responsibilities
//! - Store the six service routes built at startup
//! - Resolve a request path to its upstream target
//! - Return an explicit `NotFound` rather than a silent default

use std::str::FromStr;

use axum::http::uri::Authority;
use thiserror::Error;
use url::Url;

use crate::config::{Service, ServicesConfig};
use crate::routing::matcher::PathPrefixMatcher;

/// Reasons an upstream address is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpstreamParseError {
    #[error("'{0}' is not a valid URL")]
    InvalidUrl(String),

    #[error("unsupported scheme '{0}', only http upstreams are supported")]
    UnsupportedScheme(String),

    #[error("'{0}' has no host")]
    MissingHost(String),

    #[error("'{0}' must not carry a path, query or credentials")]
    UnexpectedComponent(String),
}

/// Network address of one backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    authority: Authority,
}

impl Upstream {
    /// Parse `http://host[:port]` or a bare `host[:port]`.
    pub fn parse(address: &str) -> Result<Self, UpstreamParseError> {
        let address = address.trim();
        let with_scheme = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        let url = Url::parse(&with_scheme)
            .map_err(|_| UpstreamParseError::InvalidUrl(address.to_string()))?;
        if url.scheme() != "http" {
            return Err(UpstreamParseError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| UpstreamParseError::MissingHost(address.to_string()))?;
        if url.path() != "/" || url.query().is_some() || !url.username().is_empty() {
            return Err(UpstreamParseError::UnexpectedComponent(address.to_string()));
        }
        let port = url.port_or_known_default().unwrap_or(80);

        let authority = Authority::from_str(&format!("{}:{}", host, port))
            .map_err(|_| UpstreamParseError::InvalidUrl(address.to_string()))?;
        Ok(Self { authority })
    }

    /// `host:port` used both as connect target and outbound Host header.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "http://{}", self.authority)
    }
}

/// A single prefix → upstream mapping.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub service: Service,
    pub matcher: PathPrefixMatcher,
    pub target: Upstream,
}

/// Returned when no registered prefix covers the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no route matches the request path")]
pub struct NotFound;

/// Immutable route table shared by every connection.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build the table from the services section.
    pub fn from_config(services: &ServicesConfig) -> Result<Self, UpstreamParseError> {
        let routes = Service::ALL
            .into_iter()
            .map(|service| {
                Ok(RouteEntry {
                    service,
                    matcher: PathPrefixMatcher::new(service.prefix()),
                    target: Upstream::parse(services.address(service))?,
                })
            })
            .collect::<Result<Vec<_>, UpstreamParseError>>()?;
        Ok(Self { routes })
    }

    /// Find the route for `path`. The path itself is forwarded unchanged.
    pub fn resolve(&self, path: &str) -> Result<&RouteEntry, NotFound> {
        self.routes.iter().find(|r| r.matcher.matches(path)).ok_or(NotFound)
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }
}
