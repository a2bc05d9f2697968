//! Sliding-window rate limiting for the notification ingress: one window
//! per `(user, channel)` pair, backed by redis sorted sets with an in-memory
//! fallback, wrapped to fail open on store outages.

pub mod fail_open;
pub mod limiter;
pub mod memory_limiter;
pub mod redis_limiter;

pub use fail_open::FailOpenRateLimiter;
pub use limiter::{AdmitResult, RateLimiter};
pub use memory_limiter::InMemoryRateLimiter;
pub use redis_limiter::RedisRateLimiter;

use std::sync::Arc;

use tracing::warn;

/// Quota, window, and backend selection for the rate limiter, read once at startup.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub redis_url: Option<String>,
    pub quota: u32,
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL").ok(),
            quota: std::env::var("RATE_LIMIT_QUOTA").ok().and_then(|v| v.parse().ok()).unwrap_or(50),
            window_secs: std::env::var("RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }
}

pub type SharedRateLimiter = Arc<dyn RateLimiter>;

/// Builds a fail-open limiter against redis when `REDIS_URL` is set and
/// reachable, otherwise falls back to the in-process window.
pub async fn limiter_from_env(config: &RateLimitConfig) -> SharedRateLimiter {
    match &config.redis_url {
        Some(url) => match RedisRateLimiter::connect(url).await {
            Ok(limiter) => Arc::new(FailOpenRateLimiter::new(limiter)),
            Err(err) => {
                warn!(%err, "failed to connect to redis, using in-memory rate limiter");
                Arc::new(FailOpenRateLimiter::new(InMemoryRateLimiter::new()))
            }
        },
        None => {
            warn!("REDIS_URL not set, using in-memory rate limiter");
            Arc::new(FailOpenRateLimiter::new(InMemoryRateLimiter::new()))
        }
    }
}
