use anyhow::{Context, Result};
use async_nats::jetstream::stream::{Config as StreamConfig, RetentionPolicy};
use async_nats::jetstream::Context as JsContext;
use async_nats::{Client, HeaderMap};
use async_trait::async_trait;
use notify_core::subjects::{channel_stream, channel_subject};
use notify_core::{Channel, QueueMessage};

/// Routes a message onto its channel's durable work queue. Implemented by
/// [`Publisher`] against real JetStream and by [`InMemoryPublisher`] in
/// tests that don't need a broker.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, message: &QueueMessage) -> Result<()>;
}

/// Publishes notification messages onto their channel's durable work queue.
/// One stream per channel keeps a burst on one channel (say, push) from
/// crowding out delivery capacity for the others.
#[derive(Clone)]
pub struct Publisher {
    js: JsContext,
}

impl Publisher {
    pub async fn new(client: Client) -> Result<Self> {
        let js = async_nats::jetstream::new(client);
        for channel in Channel::all() {
            ensure_channel_stream(&js, channel).await?;
        }
        Ok(Self { js })
    }
}

#[async_trait]
impl MessagePublisher for Publisher {
    async fn publish(&self, message: &QueueMessage) -> Result<()> {
        let subject = channel_subject(message.channel);
        let payload = serde_json::to_vec(message).context("serializing queue message")?;

        let mut headers = HeaderMap::new();
        headers.insert("x-retry-count", message.retry_count.to_string().as_str());
        headers.insert("x-idempotency-key", message.idempotency_key.as_str());

        self.js
            .publish_with_headers(subject.clone(), headers, payload.into())
            .await
            .with_context(|| format!("publish to {subject}"))?
            .await
            .with_context(|| format!("await publish ack for {subject}"))?;
        Ok(())
    }
}

async fn ensure_channel_stream(js: &JsContext, channel: Channel) -> Result<()> {
    let name = channel_stream(channel);
    let subject = channel_subject(channel);
    let cfg = StreamConfig {
        name: name.clone(),
        subjects: vec![subject],
        retention: RetentionPolicy::WorkQueue,
        max_messages: -1,
        max_messages_per_subject: -1,
        max_bytes: -1,
        ..Default::default()
    };
    js.get_or_create_stream(cfg).await.with_context(|| format!("ensure stream {name}"))?;
    Ok(())
}

/// Test double that records published messages in memory instead of talking
/// to a broker.
#[derive(Clone, Default)]
pub struct InMemoryPublisher {
    published: std::sync::Arc<tokio::sync::Mutex<Vec<QueueMessage>>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<QueueMessage> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(&self, message: &QueueMessage) -> Result<()> {
        self.published.lock().await.push(message.clone());
        Ok(())
    }
}
