use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::limiter::{AdmitResult, RateLimiter};

/// In-process sliding window over a `VecDeque` of arrival instants, one per
/// key. Used as a test double and as the local fallback when redis is down.
#[derive(Clone, Default)]
pub struct InMemoryRateLimiter {
    windows: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn admit(&self, key: &str, limit: u32, window_secs: u64) -> anyhow::Result<AdmitResult> {
        let window = Duration::from_secs(window_secs.max(1));
        let now = Instant::now();

        let mut guard = self.windows.lock().await;
        let entries = guard.entry(key.to_string()).or_default();
        while let Some(oldest) = entries.front() {
            if now.duration_since(*oldest) >= window {
                entries.pop_front();
            } else {
                break;
            }
        }

        let reset_after_secs = entries
            .front()
            .map(|oldest| (window.saturating_sub(now.duration_since(*oldest))).as_secs().max(1))
            .unwrap_or(0);

        if (entries.len() as u32) < limit {
            entries.push_back(now);
            Ok(AdmitResult {
                allowed: true,
                remaining: limit - entries.len() as u32,
                reset_after_secs,
            })
        } else {
            Ok(AdmitResult { allowed: false, remaining: 0, reset_after_secs })
        }
    }
}
