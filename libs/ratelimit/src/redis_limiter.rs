use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::Script;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::limiter::{AdmitResult, RateLimiter};

/// Prunes expired members from the sorted set, counts what's left, and
/// conditionally admits the current request, all inside one EVAL so the
/// read-count-write sequence can't race across concurrent callers. Members
/// are scored by arrival time in milliseconds; the member value only needs
/// to be unique per call; the request's message id works well since it's
/// already on hand and makes the window human-inspectable.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now_ms = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', now_ms - window_ms)
local count = redis.call('ZCARD', key)

local reset_at = now_ms + window_ms
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
  reset_at = tonumber(oldest[2]) + window_ms
end

if count < limit then
  redis.call('ZADD', key, now_ms, member)
  redis.call('PEXPIRE', key, window_ms)
  return {1, limit - count - 1, reset_at}
else
  return {0, 0, reset_at}
end
"#;

pub struct RedisRateLimiter {
    conn: Mutex<redis::aio::ConnectionManager>,
    script: Script,
}

impl RedisRateLimiter {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid redis url")?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;
        Ok(Self { conn: Mutex::new(conn), script: Script::new(SLIDING_WINDOW_SCRIPT) })
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn admit(&self, key: &str, limit: u32, window_secs: u64) -> Result<AdmitResult> {
        let now_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let window_ms = (window_secs.max(1) as i128) * 1000;
        let member = uuid::Uuid::new_v4().to_string();

        let mut conn = self.conn.lock().await;
        let (allowed, remaining, reset_at_ms): (i64, i64, i64) = self
            .script
            .key(key)
            .arg(now_ms as i64)
            .arg(window_ms as i64)
            .arg(limit)
            .arg(member)
            .invoke_async(&mut *conn)
            .await
            .context("sliding window script failed")?;

        let reset_after_ms = (reset_at_ms - now_ms as i64).max(0) as u64;
        Ok(AdmitResult {
            allowed: allowed == 1,
            remaining: remaining.max(0) as u32,
            reset_after_secs: reset_after_ms.div_ceil(1000),
        })
    }
}
