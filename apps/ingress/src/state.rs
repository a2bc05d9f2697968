use std::sync::Arc;

use notify_dlq::DeadLetterSink;
use notify_idempotency::IdempotencyCache;
use notify_queue::MessagePublisher;
use notify_ratelimit::SharedRateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub rate_limiter: SharedRateLimiter,
    pub idempotency: Arc<IdempotencyCache>,
    pub publisher: Arc<dyn MessagePublisher>,
    pub dlq: Arc<dyn DeadLetterSink>,
    pub rate_limit_quota: u32,
    pub rate_limit_window_secs: u64,
    /// `None` in tests that don't talk to a broker; `/health` and `/ready`
    /// treat that as connected since there's nothing to be disconnected from.
    pub nats: Option<async_nats::Client>,
}

impl AppState {
    pub fn broker_connected(&self) -> bool {
        match &self.nats {
            Some(client) => client.connection_state() == async_nats::connection::State::Connected,
            None => true,
        }
    }
}
