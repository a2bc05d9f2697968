use async_trait::async_trait;
use tracing::error;

use crate::limiter::{AdmitResult, RateLimiter};

/// Wraps any [`RateLimiter`] so a store outage admits the request instead of
/// blocking traffic on an infrastructure failure, matching the pipeline's
/// documented failure policy for the admission check.
pub struct FailOpenRateLimiter<L> {
    inner: L,
}

impl<L: RateLimiter> FailOpenRateLimiter<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<L: RateLimiter> RateLimiter for FailOpenRateLimiter<L> {
    async fn admit(&self, key: &str, limit: u32, window_secs: u64) -> anyhow::Result<AdmitResult> {
        match self.inner.admit(key, limit, window_secs).await {
            Ok(result) => Ok(result),
            Err(err) => {
                error!(%err, %key, "rate limit store unavailable, admitting request");
                Ok(AdmitResult { allowed: true, remaining: limit, reset_after_secs: window_secs })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct AlwaysFails;

    #[async_trait]
    impl RateLimiter for AlwaysFails {
        async fn admit(&self, _key: &str, _limit: u32, _window_secs: u64) -> anyhow::Result<AdmitResult> {
            Err(anyhow::anyhow!("connection reset"))
        }
    }

    #[tokio::test]
    async fn admits_when_store_errors() {
        let limiter = FailOpenRateLimiter::new(AlwaysFails);
        let result = limiter.admit("u1:email", 10, 60).await.unwrap();
        assert!(result.allowed);
    }
}
