//! sdwan-control
//!
//! Single binary serving the telemetry-ingest and route-fetch endpoints
//! for the overlay routing system, plus a `/health` liveness check.

mod api;
mod solver;
mod state;
mod topology;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use sdwan_common::config::ControllerConfig;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "sdwan-control", about = "sdwan overlay routing controller")]
struct Cli {
    /// Path to the controller's TOML config file.
    #[arg(long, default_value = "controller.toml")]
    config: String,

    /// Override the listen address from the config file.
    #[arg(long)]
    listen_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = if std::path::Path::new(&cli.config).exists() {
        ControllerConfig::from_file(&cli.config)
            .with_context(|| format!("loading config from {}", cli.config))?
    } else {
        tracing::warn!(path = %cli.config, "config file not found, using defaults");
        ControllerConfig::default()
    };
    if let Some(addr) = cli.listen_addr {
        config.listen_addr = addr;
    }

    let state = AppState::new(&config);

    let stale_threshold = config.topology.stale_threshold_s;
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(stale_threshold.max(1)));
        loop {
            interval.tick().await;
            let removed = sweep_state.topology().remove_stale(stale_threshold);
            for agent_id in removed {
                tracing::debug!(agent_id = %agent_id, "evicted stale topology entry");
            }
        }
    });

    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("parsing listen_addr {}", config.listen_addr))?;

    tracing::info!(%addr, "sdwan-control listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
