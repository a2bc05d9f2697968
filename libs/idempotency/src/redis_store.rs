use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::store::KvStore;

/// Shared-store backend over Redis: a single multiplexed `ConnectionManager`
/// cloned cheaply per call, wrapped here behind a mutex only to serialize
/// the `GET`/`SET NX` pair that `put_if_absent` is built from.
pub struct RedisKvStore {
    conn: Mutex<redis::aio::ConnectionManager>,
}

impl RedisKvStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid redis url")?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.lock().await;
        let value: Option<String> = conn.get(key).await.context("redis GET failed")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let _: () = conn
            .set_ex(key, value, ttl_secs.max(1))
            .await
            .context("redis SET EX failed")?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async(&mut *conn)
            .await
            .context("redis SET NX EX failed")?;
        Ok(reply.is_some())
    }
}
