//! sdwan-agent
//!
//! Runs on every overlay node. Probes peer link quality, reports
//! telemetry to the controller, and reconciles the kernel forwarding
//! table against the routes the controller hands back.

mod client;
mod coordinator;
mod prober;
mod reconciler;
mod sliding_window;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sdwan_common::config::AgentConfig;
use tracing_subscriber::EnvFilter;

use crate::client::ControllerClient;
use crate::coordinator::Coordinator;
use crate::prober::{PingProber, ProbeEngine};
use crate::reconciler::{IpRouteCommand, Reconciler};

/// sdwan overlay routing agent daemon.
#[derive(Parser, Debug)]
#[command(name = "sdwan-agent", about = "sdwan overlay routing agent")]
struct Cli {
    /// Path to the agent's TOML config file.
    #[arg(long, default_value = "agent.toml")]
    config: String,

    /// Override the agent id from the config file.
    #[arg(long)]
    agent_id: Option<String>,

    /// Override the controller URL from the config file.
    #[arg(long)]
    controller_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AgentConfig::from_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config))?;
    if let Some(agent_id) = cli.agent_id {
        config.agent_id = agent_id;
    }
    if let Some(url) = cli.controller_url {
        config.controller.url = url;
    }

    tracing::info!(
        agent_id = %config.agent_id,
        controller = %config.controller.url,
        "sdwan-agent starting"
    );

    let probe_engine = ProbeEngine::new(
        config.network.peer_ips.clone(),
        Duration::from_secs(config.probe.timeout_s),
        config.probe.window_size,
        Box::new(PingProber),
    );

    let client = Arc::new(ControllerClient::new(
        config.controller.url.clone(),
        Duration::from_secs(config.controller.timeout_s),
        config.sync.retry_attempts,
        config.sync.retry_backoff_s.clone(),
    )?);

    let allowed_subnet = config
        .network
        .subnet
        .parse()
        .with_context(|| format!("parsing network.subnet {}", config.network.subnet))?;
    let reconciler = Arc::new(Reconciler::new(
        Box::new(IpRouteCommand::new(config.network.interface.clone())),
        allowed_subnet,
    ));

    let coordinator = Arc::new(Coordinator::new(
        config.agent_id.clone(),
        Duration::from_secs(config.probe.interval_s),
        Duration::from_secs(config.sync.interval_s),
        probe_engine,
        client,
        reconciler,
    ));

    let shutdown_tx = coordinator.shutdown_handle();
    let mut run_handle = tokio::spawn(coordinator.run());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
            let _ = shutdown_tx.send(true);
            if tokio::time::timeout(Duration::from_secs(10), &mut run_handle)
                .await
                .is_err()
            {
                tracing::warn!("coordinator did not stop within the shutdown grace period");
            }
        }
        result = &mut run_handle => {
            if let Err(e) = result {
                tracing::error!(error = %e, "coordinator task panicked");
            }
        }
    }

    tracing::info!("sdwan-agent stopped");
    Ok(())
}
