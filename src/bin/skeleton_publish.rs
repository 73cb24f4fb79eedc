//! Skeleton publisher
//!
//! Replays a JSON-lines recording through the detection pipeline and
//! publishes the extracted joints to the relay. The recording path comes from
//! `SKELETON_RELAY_RECORDING`, the configuration from `SKELETON_RELAY_CONFIG`.

use anyhow::Context;
use futures::StreamExt;
use skeleton_relay::{RelayConfig, SkeletonRelay};
use tracing::info;
use tracing_subscriber::EnvFilter;

const RECORDING_ENV: &str = "SKELETON_RELAY_RECORDING";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::from_env().context("loading relay configuration")?;
    let recording = std::env::var_os(RECORDING_ENV)
        .with_context(|| format!("{RECORDING_ENV} must name a recording file"))?;

    let mut driver = SkeletonRelay::replay(&recording, &config)?;
    let mut events = driver.events(config.render.rate);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            event = events.next() => {
                let Some(event) = event else {
                    break;
                };
                if event.is_transition() {
                    info!("{}", driver.detection().status_text());
                }
            }
        }
    }

    let report = driver.shutdown().await?;
    info!(
        frames = report.frames,
        sent = report.publisher.sent,
        throttled = report.publisher.throttled,
        dropped = report.publisher.dropped,
        "Replay finished"
    );
    Ok(())
}
