//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::{GatewayConfig, Service};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: String, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => write!(f, "Invalid value for {}: '{}'", var, value),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts `std::env::var` so overrides can be exercised in tests.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("GATEWAY_HOST") {
        config.listener.host = host;
    }
    if let Some(port) = parsed(&lookup, "GATEWAY_PORT")? {
        config.listener.port = port;
    }
    if let Some(window) = parsed(&lookup, "GATEWAY_RATE_LIMIT_WINDOW_SECS")? {
        config.rate_limit.window_secs = window;
    }
    if let Some(max) = parsed(&lookup, "GATEWAY_RATE_LIMIT_MAX_REQUESTS")? {
        config.rate_limit.max_requests = max;
    }
    if let Some(timeout) = parsed(&lookup, "GATEWAY_UPSTREAM_TIMEOUT_SECS")? {
        config.timeouts.upstream_secs = timeout;
    }
    if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
        config.observability.log_level = level;
    }
    for service in Service::ALL {
        if let Some(address) = lookup(service.env_var()) {
            *config.services.address_mut(service) = address;
        }
    }
    Ok(())
}

fn parsed<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var: var.to_string(), value }),
        None => Ok(None),
    }
}
