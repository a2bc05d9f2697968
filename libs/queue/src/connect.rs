use std::time::Duration;

use anyhow::{Context, Result};
use async_nats::Client;
use tracing::warn;

const MAX_STARTUP_ATTEMPTS: u32 = 10;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Connects to NATS with exponential backoff, doubling from one second up to
/// a thirty second cap, giving up after ten attempts so a misconfigured
/// deployment fails fast instead of spinning forever.
pub async fn connect_with_retry(nats_url: &str) -> Result<Client> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match async_nats::connect(nats_url).await {
            Ok(client) => return Ok(client),
            Err(err) if attempt >= MAX_STARTUP_ATTEMPTS => {
                return Err(err).with_context(|| {
                    format!("failed to connect to nats at {nats_url} after {attempt} attempts")
                })
            }
            Err(err) => {
                warn!(%err, attempt, backoff_secs = backoff.as_secs(), "nats connection failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}
