use anyhow::{Context, Result};
use notify_core::subjects::{delivered_key, idempotency_key};
use notify_core::NotificationResponse;
use tracing::warn;

use crate::store::SharedKvStore;

/// Wraps a [`SharedKvStore`] with the two idempotency behaviors the pipeline
/// needs: the pre-publish response cache ingress probes before queuing a
/// duplicate, and the delivery-side guard the worker checks before a sender
/// actually fires. Both reuse the same `put_if_absent` primitive; only the
/// stored value and the TTL differ.
pub struct IdempotencyCache {
    store: SharedKvStore,
    response_ttl_secs: u64,
    delivered_ttl_secs: u64,
}

impl IdempotencyCache {
    pub fn new(store: SharedKvStore, response_ttl_secs: u64, delivered_ttl_secs: u64) -> Self {
        Self { store, response_ttl_secs, delivered_ttl_secs }
    }

    /// Looks up a previously cached response for `(user_id, idempotency_key)`.
    /// `None` means this is the first sighting and the caller should proceed.
    pub async fn probe(&self, user_id: &str, idempotency_key_value: &str) -> Result<Option<NotificationResponse>> {
        let key = idempotency_key(user_id, idempotency_key_value);
        match self.store.get(&key).await.context("idempotency probe failed")? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(response) => Ok(Some(response)),
                Err(err) => {
                    warn!(%err, %key, "discarding unparseable cached idempotency response");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Caches `response` under `(user_id, idempotency_key)` for later probes.
    /// Called once, right after a request is durably queued.
    pub async fn store_response(
        &self,
        user_id: &str,
        idempotency_key_value: &str,
        response: &NotificationResponse,
    ) -> Result<()> {
        let key = idempotency_key(user_id, idempotency_key_value);
        let raw = serde_json::to_string(response).context("serializing idempotency response")?;
        self.store
            .set(&key, &raw, self.response_ttl_secs)
            .await
            .context("idempotency store failed")
    }

    /// Delivery-side dedup guard: returns `true` the first time this
    /// `(user_id, idempotency_key)` pair reaches the worker, `false` on any
    /// subsequent sighting (e.g. a message redelivered after an ack was lost).
    pub async fn claim_delivery(&self, user_id: &str, idempotency_key_value: &str) -> Result<bool> {
        let key = delivered_key(user_id, idempotency_key_value);
        self.store
            .put_if_absent(&key, "1", self.delivered_ttl_secs)
            .await
            .context("delivery guard check failed")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use notify_core::ResponseStatus;
    use uuid::Uuid;

    use super::*;
    use crate::memory_store::InMemoryKvStore;

    fn cache() -> IdempotencyCache {
        IdempotencyCache::new(Arc::new(InMemoryKvStore::new()), 3600, 86_400)
    }

    #[tokio::test]
    async fn probe_misses_before_any_store() {
        let cache = cache();
        assert!(cache.probe("u1", "k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_then_probe_round_trips() {
        let cache = cache();
        let response = NotificationResponse::queued(Uuid::new_v4());
        cache.store_response("u1", "k1", &response).await.unwrap();

        let cached = cache.probe("u1", "k1").await.unwrap().unwrap();
        assert_eq!(cached.id, response.id);
        assert_eq!(cached.status, ResponseStatus::Queued);
    }

    #[tokio::test]
    async fn claim_delivery_only_succeeds_once() {
        let cache = cache();
        assert!(cache.claim_delivery("u1", "k1").await.unwrap());
        assert!(!cache.claim_delivery("u1", "k1").await.unwrap());
        assert!(cache.claim_delivery("u1", "k2").await.unwrap());
    }
}
