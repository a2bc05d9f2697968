use std::net::SocketAddr;

use anyhow::{Context, Result};
use notify_idempotency::IdempotencyConfig;
use notify_ratelimit::RateLimitConfig;

pub struct Config {
    pub bind: SocketAddr,
    pub nats_url: String,
    pub rate_limit: RateLimitConfig,
    pub idempotency: IdempotencyConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bind = std::env::var("BIND").unwrap_or_else(|_| "0.0.0.0:8080".into());
        let bind = bind.parse().with_context(|| format!("invalid BIND address {bind}"))?;
        let nats_url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());

        Ok(Self {
            bind,
            nats_url,
            rate_limit: RateLimitConfig::from_env(),
            idempotency: IdempotencyConfig::from_env(),
        })
    }
}
