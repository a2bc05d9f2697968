use async_trait::async_trait;

/// Outcome of a single admission check against a sliding window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmitResult {
    pub allowed: bool,
    pub remaining: u32,
    /// Seconds until the window's oldest member ages out and a slot frees up.
    pub reset_after_secs: u64,
}

/// Per-(user, channel) sliding-window admission control. Implementations
/// must treat the combination of "prune expired entries, count, compare to
/// limit, conditionally record" as a single atomic step — two concurrent
/// callers racing the read-then-write would both get admitted past the cap.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn admit(&self, key: &str, limit: u32, window_secs: u64) -> anyhow::Result<AdmitResult>;
}
