use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::KvStore;

/// Single-process fallback used when the shared store is unreachable, and
/// directly in unit tests.
#[derive(Clone, Default)]
pub struct InMemoryKvStore {
    inner: Arc<RwLock<HashMap<String, (String, Instant)>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn live_value(&self, key: &str) -> Option<String> {
        let guard = self.inner.read().await;
        guard.get(key).and_then(|(value, expires)| {
            if *expires > Instant::now() {
                Some(value.clone())
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live_value(key).await)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut guard = self.inner.write().await;
        guard.insert(
            key.to_string(),
            (value.to_string(), Instant::now() + Duration::from_secs(ttl_secs.max(1))),
        );
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let now = Instant::now();
        match guard.get(key) {
            Some((_, expires)) if *expires > now => Ok(false),
            _ => {
                guard.insert(
                    key.to_string(),
                    (value.to_string(), now + Duration::from_secs(ttl_secs.max(1))),
                );
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_if_absent_rejects_second_write() {
        let store = InMemoryKvStore::new();
        assert!(store.put_if_absent("k", "v1", 10).await.unwrap());
        assert!(!store.put_if_absent("k", "v2", 10).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn expired_entry_is_treated_as_absent() {
        let store = InMemoryKvStore::new();
        store
            .inner
            .write()
            .await
            .insert("k".into(), ("old".into(), Instant::now() - Duration::from_secs(1)));
        assert!(store.put_if_absent("k", "new", 10).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn set_overwrites_unconditionally() {
        let store = InMemoryKvStore::new();
        store.set("k", "v1", 10).await.unwrap();
        store.set("k", "v2", 10).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }
}
