//! Relay probe
//!
//! Connects to the relay at `publisher.url`, sends a greeting, prints every
//! message received for five seconds and closes the connection.

use anyhow::Context;
use futures::{SinkExt, StreamExt};
use skeleton_relay::{JointPayload, RelayConfig};
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const GREETING: &str = "Hello, relay!";
const LISTEN_FOR: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::from_env().context("loading relay configuration")?;
    let url = config.publisher.url;

    info!(%url, "Connecting");
    let (mut socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("connecting to {url}"))?;
    info!("Connected, listening for {}s", LISTEN_FOR.as_secs());

    socket.send(Message::Text(GREETING.to_string())).await?;

    let deadline = Instant::now() + LISTEN_FOR;
    let mut received = 0u64;
    loop {
        match timeout_at(deadline, socket.next()).await {
            Err(_) => break,
            Ok(None) => {
                info!("Relay closed the connection");
                break;
            }
            Ok(Some(Err(e))) => {
                warn!("Connection error: {}", e);
                break;
            }
            Ok(Some(Ok(Message::Text(text)))) => {
                received += 1;
                match JointPayload::from_json(&text) {
                    Ok(payload) => {
                        for (joint, coord) in payload.iter() {
                            println!("{}: ({}, {})", joint, coord.x, coord.y);
                        }
                    }
                    Err(_) => println!("{text}"),
                }
            }
            Ok(Some(Ok(Message::Close(frame)))) => {
                info!(?frame, "Relay sent close");
                break;
            }
            Ok(Some(Ok(_))) => {}
        }
    }

    if let Err(e) = socket.close(None).await {
        warn!("Close failed: {}", e);
    }
    info!(received, "Probe finished");
    Ok(())
}
