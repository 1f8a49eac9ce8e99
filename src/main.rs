//! Route service.
//!
//! Sits in a routing layer's request path and, for every request carrying the
//! route-service control headers, either forwards it to `X-CF-Forwarded-Url`
//! or rejects it.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                ROUTE SERVICE                  │
//!   Routing layer         │  ┌─────────────┐   ┌────────────┐            │
//!   ──────────────────────┼─▶│ route match │──▶│ authorizer │──┐         │
//!                         │  │ (3 headers) │   │ (XFF ∩ IPs)│  │         │
//!                         │  └──────┬──────┘   └─────┬──────┘  │ allow   │
//!                         │     404 │            403 │         ▼         │
//!                         │         ▼                ▼   ┌───────────┐   │
//!   ◀─────────────────────┼─────────────────────────────│   relay   │◀──┼──── Forwarded URL
//!                         │                              └───────────┘   │
//!                         └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use route_service::config::{resolve_config, ConfigOverrides};
use route_service::lifecycle::{shutdown_signal, Shutdown};
use route_service::observability::{logging, metrics};
use route_service::HttpServer;

#[derive(Parser)]
#[command(name = "route-service")]
#[command(about = "Forward allowlisted clients to the X-CF-Forwarded-Url target", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long, env = "ROUTE_SERVICE_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated IP allowlist.
    #[arg(long, env = "VALID_IPS")]
    valid_ips: Option<String>,

    /// Listen port, replacing the port of the configured bind address.
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = resolve_config(
        cli.config.as_deref(),
        ConfigOverrides {
            valid_ips: cli.valid_ips,
            port: cli.port,
        },
    )?;

    logging::init(&config.observability);

    tracing::info!("route-service v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        connect_timeout_secs = config.timeouts.connect_secs,
        response_timeout_secs = config.timeouts.response_secs,
        idle_timeout_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validated above.
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
