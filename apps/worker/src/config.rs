use notify_idempotency::IdempotencyConfig;

use crate::pipeline::WorkerConfig;

pub struct Config {
    pub nats_url: String,
    pub idempotency: IdempotencyConfig,
    pub worker: WorkerConfig,
    pub max_ack_pending: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            nats_url: std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into()),
            idempotency: IdempotencyConfig::from_env(),
            worker: WorkerConfig::from_env(),
            max_ack_pending: std::env::var("WORKER_PREFETCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
        }
    }
}
