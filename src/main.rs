//! Campus API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                      GATEWAY                         │
//!   Client request       │  ┌──────────┐   ┌──────────┐   ┌────────────┐        │
//!   ─────────────────────┼─▶│ security │──▶│   rate   │──▶│  routing   │        │
//!                        │  │ headers  │   │ limiter  │   │   table    │        │
//!                        │  └──────────┘   └──────────┘   └─────┬──────┘        │
//!                        │       ▲                              │ 404           │
//!                        │       │ 429                          ▼               │
//!   Client response      │       │                       ┌────────────┐         │
//!   ◀────────────────────┼───────┴───────────────────────│   proxy /  │◀────────┼──── Upstream
//!                        │                    502 / 504  │  websocket │         │     service
//!                        │                               └────────────┘         │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tokio::net::TcpListener;

use campus_gateway::config::{load_config, validation::validate_config, ConfigError};
use campus_gateway::lifecycle::{signals, Shutdown};
use campus_gateway::observability::{logging, metrics};
use campus_gateway::GatewayServer;

/// Command-line flags. Anything not given here comes from the config file
/// and environment.
#[derive(Debug, Parser)]
#[command(name = "campus-gateway", version, about = "API gateway for the campus attendance services")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port (overrides config and GATEWAY_PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.listener.port = port;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init(&config.observability)?;
    tracing::info!("campus-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        rate_limit_enabled = config.rate_limit.enabled,
        window_secs = config.rate_limit.window_secs,
        max_requests = config.rate_limit.max_requests,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let addr: SocketAddr = config.listener.bind_address().parse()?;
    let tls = config.listener.tls.clone();

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let server = GatewayServer::new(config)?;
    match tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(addr).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
