use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Contract implemented by shared-store backends for the idempotency cache
/// and the delivery-side dedup guard. Both are string-keyed TTL stores;
/// the only operation that must be atomic is `put_if_absent`.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Writes `value` under `key` with `ttl_secs` only if `key` did not
    /// already hold a value. Returns `true` when the write happened (first
    /// sighting), `false` for a pre-existing key (duplicate).
    async fn put_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool>;
}

pub type SharedKvStore = Arc<dyn KvStore>;
