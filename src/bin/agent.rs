//! Waypoint agent - registers a worker machine with a Waypoint gateway
//!
//! Connects to the gateway's registration channel, announces this machine's
//! name, and pings until stopped. Reconnects forever on failure.

use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypoint::config::AgentArgs;
use waypoint::worker::{KeepaliveClient, KeepaliveConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = AgentArgs::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("waypoint={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Waypoint agent '{}' connecting to {}",
        args.worker_name, args.waypoint_url
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let client = KeepaliveClient::new(KeepaliveConfig::from(&args));
    client.run(shutdown_rx).await;

    info!("Agent stopped");
    Ok(())
}
