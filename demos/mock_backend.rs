//! Stand-in backend services for trying the gateway locally.
//!
//! Starts one small HTTP server per service on the default upstream
//! addresses (127.0.0.1:8001 to 8006). Each answers every path with its own
//! name, so `curl localhost:3000/attendance/today` shows which service the
//! gateway picked.

use axum::{extract::Request, routing::get, Router};
use campus_gateway::config::{Service, ServicesConfig};
use campus_gateway::routing::Upstream;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let services = ServicesConfig::default();
    let mut servers = Vec::new();

    for service in Service::ALL {
        let upstream = Upstream::parse(services.address(service))?;
        let listener = tokio::net::TcpListener::bind(upstream.authority().as_str()).await?;
        println!("{service} mock listening on {upstream}");

        let name = service.name();
        let app = Router::new()
            .route("/status", get(move || async move { format!("{name} is healthy") }))
            .fallback(move |request: Request| async move {
                format!("{name} handled {} {}\n", request.method(), request.uri())
            });
        servers.push(tokio::spawn(async move { axum::serve(listener, app).await }));
    }

    for server in servers {
        server.await??;
    }
    Ok(())
}
