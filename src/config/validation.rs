//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check every upstream resolves to a plain-HTTP authority
//! - Bound durations so deadlines stay representable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;
use std::path::Path;

use crate::config::schema::{GatewayConfig, Service};
use crate::routing::Upstream;

/// Longest accepted rate-limit window and sweep interval (one week).
pub const MAX_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest accepted connect or upstream timeout (one hour).
pub const MAX_TIMEOUT_SECS: u64 = 60 * 60;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g., "rate_limit.window_secs").
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be between 1 and 65535"));
    }
    if config.listener.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.host",
            format!("'{}' is not an IP address", config.listener.host),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if !Path::new(&tls.cert_path).exists() {
            errors.push(ValidationError::new(
                "listener.tls.cert_path",
                format!("file not found: {}", tls.cert_path),
            ));
        }
        if !Path::new(&tls.key_path).exists() {
            errors.push(ValidationError::new(
                "listener.tls.key_path",
                format!("file not found: {}", tls.key_path),
            ));
        }
    }

    for service in Service::ALL {
        if let Err(e) = Upstream::parse(config.services.address(service)) {
            errors.push(ValidationError::new(format!("services.{}", service.name()), e.to_string()));
        }
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.enabled {
        check_range(&mut errors, "rate_limit.window_secs", rate_limit.window_secs, MAX_WINDOW_SECS);
        if rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
        }
        check_range(
            &mut errors,
            "rate_limit.sweep_interval_secs",
            rate_limit.sweep_interval_secs,
            MAX_WINDOW_SECS,
        );
    }

    let timeouts = &config.timeouts;
    check_range(&mut errors, "timeouts.connect_secs", timeouts.connect_secs, MAX_TIMEOUT_SECS);
    check_range(&mut errors, "timeouts.upstream_secs", timeouts.upstream_secs, MAX_TIMEOUT_SECS);
    if timeouts.connect_secs > timeouts.upstream_secs {
        errors.push(ValidationError::new(
            "timeouts.connect_secs",
            format!(
                "must not exceed timeouts.upstream_secs ({})",
                timeouts.upstream_secs
            ),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_range(errors: &mut Vec<ValidationError>, field: &str, value: u64, max: u64) {
    if value == 0 || value > max {
        errors.push(ValidationError::new(field, format!("must be between 1 and {}", max)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.port = 0;
        config.rate_limit.window_secs = 0;
        config.rate_limit.max_requests = 0;
        config.services.auth = "https://auth.internal".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.port",
                "services.auth",
                "rate_limit.window_secs",
                "rate_limit.max_requests"
            ]
        );
    }

    #[test]
    fn disabled_rate_limit_skips_its_checks() {
        let mut config = GatewayConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.max_requests = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn missing_tls_files_are_reported() {
        let mut config = GatewayConfig::default();
        config.listener.tls = Some(TlsConfig {
            cert_path: "/nonexistent/cert.pem".into(),
            key_path: "/nonexistent/key.pem".into(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn rejects_non_ip_host() {
        let mut config = GatewayConfig::default();
        config.listener.host = "not an ip".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "listener.host");
    }

    #[test]
    fn durations_are_bounded() {
        let mut config = GatewayConfig::default();
        config.rate_limit.window_secs = u64::MAX;
        config.rate_limit.sweep_interval_secs = MAX_WINDOW_SECS + 1;
        config.timeouts.upstream_secs = u64::MAX;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "rate_limit.window_secs",
                "rate_limit.sweep_interval_secs",
                "timeouts.upstream_secs"
            ]
        );

        config.rate_limit.window_secs = MAX_WINDOW_SECS;
        config.rate_limit.sweep_interval_secs = MAX_WINDOW_SECS;
        config.timeouts.upstream_secs = MAX_TIMEOUT_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn connect_timeout_must_not_exceed_upstream_timeout() {
        let mut config = GatewayConfig::default();
        config.timeouts.connect_secs = 10;
        config.timeouts.upstream_secs = 5;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "timeouts.connect_secs");

        config.timeouts.connect_secs = 5;
        assert!(validate_config(&config).is_ok());
    }
}
