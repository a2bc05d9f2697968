//! Shared-store idempotency: the pre-publish response cache ingress consults
//! before queuing a duplicate request, and the delivery-side guard the
//! worker consults before a sender actually fires.

pub mod cache;
pub mod memory_store;
pub mod redis_store;
pub mod store;

pub use cache::IdempotencyCache;
pub use memory_store::InMemoryKvStore;
pub use redis_store::RedisKvStore;
pub use store::{KvStore, SharedKvStore};

use std::sync::Arc;

use tracing::warn;

/// TTLs and backend selection for the idempotency cache, read once at startup.
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    pub redis_url: Option<String>,
    pub response_ttl_secs: u64,
    pub delivered_ttl_secs: u64,
}

impl IdempotencyConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL").ok(),
            response_ttl_secs: std::env::var("IDEMPOTENCY_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
            delivered_ttl_secs: std::env::var("DELIVERED_GUARD_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
        }
    }
}

/// Builds the cache against Redis when `REDIS_URL` is set and reachable,
/// otherwise falls back to an in-process store and logs the degradation.
pub async fn cache_from_env(config: &IdempotencyConfig) -> IdempotencyCache {
    let store: SharedKvStore = match &config.redis_url {
        Some(url) => match RedisKvStore::connect(url).await {
            Ok(store) => Arc::new(store),
            Err(err) => {
                warn!(%err, "failed to connect to redis, using in-memory idempotency store");
                Arc::new(InMemoryKvStore::new())
            }
        },
        None => {
            warn!("REDIS_URL not set, using in-memory idempotency store");
            Arc::new(InMemoryKvStore::new())
        }
    };
    IdempotencyCache::new(store, config.response_ttl_secs, config.delivered_ttl_secs)
}
