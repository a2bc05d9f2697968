use std::time::Duration;

use notify_core::subjects::delivered_key;
use notify_core::{NotificationSender, QueueMessage, SendOutcome};
use notify_dlq::{DeadLetterSink, DlqError};
use notify_idempotency::IdempotencyCache;
use notify_queue::MessagePublisher;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub max_retries: u32,
    pub retry_base_ms: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            max_retries: std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            retry_base_ms: std::env::var("RETRY_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(1000),
        }
    }
}

fn backoff_delay(config: &WorkerConfig, retry_count: u32) -> Duration {
    let millis = config.retry_base_ms.saturating_mul(1u64 << retry_count.min(16));
    Duration::from_millis(millis)
}

/// Runs one message through the full delivery pipeline: the delivered-guard
/// check, the sender invocation, and whatever follow-up the outcome calls
/// for (ack, retry republish, or dead-letter). Every branch, including
/// infrastructure errors from the guard/publisher/sink themselves, ends in
/// a best-effort side effect and a log line rather than a propagated error —
/// the caller always acks the delivery it handed in, so the only thing this
/// function decides is what (if anything) happens before that ack.
pub async fn handle_message(
    message: QueueMessage,
    idempotency: &IdempotencyCache,
    publisher: &dyn MessagePublisher,
    dlq: &dyn DeadLetterSink,
    sender: &dyn NotificationSender,
    config: &WorkerConfig,
) {
    let key = delivered_key(&message.user_id, &message.idempotency_key);

    match idempotency.claim_delivery(&message.user_id, &message.idempotency_key).await {
        Ok(false) => {
            info!(msg_id = %message.id, %key, "already delivered, skipping sender invocation");
            return;
        }
        Err(err) => {
            warn!(%err, msg_id = %message.id, "delivery guard check failed, proceeding anyway");
        }
        Ok(true) => {}
    }

    match sender.send(&message.payload).await {
        SendOutcome::Ok => {
            info!(msg_id = %message.id, channel = %message.channel, "delivered");
        }
        SendOutcome::Retriable(err) if message.retry_count < config.max_retries => {
            let delay = backoff_delay(config, message.retry_count);
            warn!(
                msg_id = %message.id,
                retry_count = message.retry_count,
                delay_ms = delay.as_millis(),
                error = %err,
                "retriable send failure, scheduling retry"
            );
            tokio::time::sleep(delay).await;
            let retry = message.next_retry();
            if let Err(publish_err) = publisher.publish(&retry).await {
                error!(%publish_err, msg_id = %message.id, "failed to republish retry, dead-lettering instead");
                dead_letter(dlq, message, DlqError { code: "E_RETRY_PUBLISH".into(), message: publish_err.to_string() })
                    .await;
            }
        }
        SendOutcome::Retriable(err) => {
            warn!(msg_id = %message.id, retry_count = message.retry_count, error = %err, "retries exhausted, dead-lettering");
            dead_letter(dlq, message, DlqError { code: "E_RETRIES_EXHAUSTED".into(), message: err.to_string() }).await;
        }
        SendOutcome::Terminal(err) => {
            warn!(msg_id = %message.id, error = %err, "terminal send failure, dead-lettering");
            dead_letter(dlq, message, DlqError { code: err.code.to_string(), message: err.message }).await;
        }
    }
}

async fn dead_letter(dlq: &dyn DeadLetterSink, message: QueueMessage, error: DlqError) {
    let msg_id = message.id;
    if let Err(err) = dlq.publish(message, error).await {
        error!(%err, %msg_id, "failed to record dead-letter entry");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use notify_core::{EmailPayload, Payload, SendError};
    use notify_dlq::InMemoryDlqSink;
    use notify_idempotency::InMemoryKvStore;
    use notify_queue::InMemoryPublisher;

    use super::*;

    struct AlwaysOk;

    #[async_trait]
    impl NotificationSender for AlwaysOk {
        async fn send(&self, _payload: &Payload) -> SendOutcome {
            SendOutcome::Ok
        }
    }

    struct AlwaysRetriable;

    #[async_trait]
    impl NotificationSender for AlwaysRetriable {
        async fn send(&self, _payload: &Payload) -> SendOutcome {
            SendOutcome::Retriable(SendError::new("down", "provider unreachable"))
        }
    }

    struct AlwaysTerminal;

    #[async_trait]
    impl NotificationSender for AlwaysTerminal {
        async fn send(&self, _payload: &Payload) -> SendOutcome {
            SendOutcome::Terminal(SendError::new("bad_recipient", "recipient rejected"))
        }
    }

    fn message() -> QueueMessage {
        QueueMessage::new(
            "u1".into(),
            "k1".into(),
            Payload::Email(EmailPayload {
                to: "a@b.c".into(),
                subject: "s".into(),
                body: "b".into(),
                cc: vec![],
                bcc: vec![],
            }),
        )
    }

    fn test_config() -> WorkerConfig {
        WorkerConfig { max_retries: 5, retry_base_ms: 1 }
    }

    #[tokio::test]
    async fn successful_send_claims_guard_and_does_not_publish_or_dlq() {
        let idempotency = IdempotencyCache::new(Arc::new(InMemoryKvStore::new()), 3600, 86_400);
        let publisher = InMemoryPublisher::new();
        let dlq = InMemoryDlqSink::new();
        handle_message(message(), &idempotency, &publisher, &dlq, &AlwaysOk, &test_config()).await;
        assert!(publisher.published().await.is_empty());
        assert!(dlq.entries().await.is_empty());
    }

    #[tokio::test]
    async fn already_delivered_guard_skips_sender_and_side_effects() {
        let idempotency = IdempotencyCache::new(Arc::new(InMemoryKvStore::new()), 3600, 86_400);
        let publisher = InMemoryPublisher::new();
        let dlq = InMemoryDlqSink::new();
        let config = test_config();

        handle_message(message(), &idempotency, &publisher, &dlq, &AlwaysOk, &config).await;
        handle_message(message(), &idempotency, &publisher, &dlq, &AlwaysTerminal, &config).await;

        assert!(dlq.entries().await.is_empty(), "second delivery must never reach the sender");
    }

    #[tokio::test]
    async fn retriable_failure_republishes_with_incremented_retry_count() {
        let idempotency = IdempotencyCache::new(Arc::new(InMemoryKvStore::new()), 3600, 86_400);
        let publisher = InMemoryPublisher::new();
        let dlq = InMemoryDlqSink::new();
        handle_message(message(), &idempotency, &publisher, &dlq, &AlwaysRetriable, &test_config()).await;

        let published = publisher.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].retry_count, 1);
        assert!(dlq.entries().await.is_empty());
    }

    #[tokio::test]
    async fn retriable_failure_exhausted_goes_to_dlq() {
        let idempotency = IdempotencyCache::new(Arc::new(InMemoryKvStore::new()), 3600, 86_400);
        let publisher = InMemoryPublisher::new();
        let dlq = InMemoryDlqSink::new();
        let mut msg = message();
        msg.retry_count = 5;
        handle_message(msg, &idempotency, &publisher, &dlq, &AlwaysRetriable, &test_config()).await;

        assert!(publisher.published().await.is_empty());
        assert_eq!(dlq.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn terminal_failure_goes_to_dlq_regardless_of_retry_count() {
        let idempotency = IdempotencyCache::new(Arc::new(InMemoryKvStore::new()), 3600, 86_400);
        let publisher = InMemoryPublisher::new();
        let dlq = InMemoryDlqSink::new();
        handle_message(message(), &idempotency, &publisher, &dlq, &AlwaysTerminal, &test_config()).await;

        assert!(publisher.published().await.is_empty());
        assert_eq!(dlq.entries().await.len(), 1);
        assert_eq!(dlq.entries().await[0].1.code, "bad_recipient");
    }

    #[test]
    fn backoff_delay_follows_base_times_two_to_the_retry_count() {
        let config = WorkerConfig { max_retries: 5, retry_base_ms: 1000 };
        assert_eq!(backoff_delay(&config, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&config, 4), Duration::from_millis(16_000));
    }
}
