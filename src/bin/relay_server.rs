//! Relay server
//!
//! Accepts WebSocket clients and relays every text message to all of them.
//! Configuration is read from the YAML file named by `SKELETON_RELAY_CONFIG`;
//! defaults apply when it is unset. Log level follows `RUST_LOG`.

use anyhow::Context;
use skeleton_relay::{RelayConfig, SkeletonRelay};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::from_env().context("loading relay configuration")?;
    let mut server = SkeletonRelay::serve(&config).await.context("starting relay server")?;
    info!(url = %server.url(), "Relay ready");

    shutdown_signal().await;

    server.shutdown().await?;
    info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = signal::ctrl_c() => {},
        _ = terminate() => {},
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
