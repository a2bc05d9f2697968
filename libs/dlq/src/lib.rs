//! Dead-letter publishing for messages the worker has exhausted retries on,
//! plus the listing/replay operations the inspection CLI drives.

use anyhow::{bail, Context, Result};
use async_nats::jetstream::{
    consumer::{pull::Config as PullConfig, AckPolicy, DeliverPolicy},
    stream::{Config as StreamConfig, RetentionPolicy},
    Context as JsContext,
};
use async_nats::Client;
use async_trait::async_trait;
use futures::TryStreamExt;
use nanoid::nanoid;
use notify_core::subjects::{DEAD_LETTER_STREAM, DEAD_LETTER_SUBJECT};
use notify_core::QueueMessage;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{info, warn};

/// Error metadata recorded alongside the message that exhausted retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqError {
    pub code: String,
    pub message: String,
}

/// Payload stored for each dead-lettered entry. `message` is set for
/// notifications that failed after a successful decode; `raw` is set
/// instead for deliveries that never parsed as a `QueueMessage` in the
/// first place, so there's nothing typed left to carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqRecord {
    pub ts: String,
    pub error: DlqError,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<QueueMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Moves a message that has exhausted its retry budget to the dead-letter
/// sink. Implemented by [`DlqPublisher`] against real JetStream and by
/// [`InMemoryDlqSink`] in tests.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(&self, message: QueueMessage, error: DlqError) -> Result<()>;

    /// Records a delivery that couldn't be decoded into a `QueueMessage` at
    /// all, keeping the raw bytes (lossily, as text) for inspection instead
    /// of dropping the delivery silently.
    async fn publish_raw(&self, raw: Vec<u8>, error: DlqError) -> Result<()>;
}

#[derive(Clone)]
pub struct DlqPublisher {
    js: JsContext,
}

impl DlqPublisher {
    pub async fn new(client: Client) -> Result<Self> {
        let js = async_nats::jetstream::new(client);
        ensure_stream(&js).await?;
        Ok(Self { js })
    }

    async fn publish_record(&self, record: DlqRecord) -> Result<()> {
        let payload = serde_json::to_vec(&record).context("serializing dlq record")?;
        self.js
            .publish(DEAD_LETTER_SUBJECT, payload.into())
            .await
            .context("publish dlq entry")?;
        Ok(())
    }
}

#[async_trait]
impl DeadLetterSink for DlqPublisher {
    async fn publish(&self, message: QueueMessage, error: DlqError) -> Result<()> {
        let ts = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "1970-01-01T00:00:00Z".into());
        info!(
            msg_id = %message.id,
            user_id = %message.user_id,
            channel = %message.channel,
            retries = message.retry_count,
            code = %error.code,
            "message moved to dead-letter queue"
        );
        let record = DlqRecord { ts, error, message: Some(message), raw: None };
        self.publish_record(record).await
    }

    async fn publish_raw(&self, raw: Vec<u8>, error: DlqError) -> Result<()> {
        let ts = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "1970-01-01T00:00:00Z".into());
        info!(bytes = raw.len(), code = %error.code, "undecodable delivery moved to dead-letter queue");
        let record = DlqRecord { ts, error, message: None, raw: Some(String::from_utf8_lossy(&raw).into_owned()) };
        self.publish_record(record).await
    }
}

async fn ensure_stream(js: &JsContext) -> Result<()> {
    let cfg = StreamConfig {
        name: DEAD_LETTER_STREAM.into(),
        subjects: vec![DEAD_LETTER_SUBJECT.into()],
        retention: RetentionPolicy::WorkQueue,
        max_messages_per_subject: -1,
        max_messages: -1,
        max_bytes: -1,
        description: Some("dead letters for notifications that exhausted retries".into()),
        ..StreamConfig::default()
    };

    match js.get_stream(DEAD_LETTER_STREAM).await {
        Ok(_) => Ok(()),
        Err(_) => {
            js.create_stream(cfg).await.context("create dead-letter stream")?;
            Ok(())
        }
    }
}

/// Representation returned by the inspection CLI.
#[derive(Debug, Clone)]
pub struct DlqEntry {
    pub record: DlqRecord,
    pub sequence: u64,
}

pub async fn list_entries(client: &Client, limit: usize) -> Result<Vec<DlqEntry>> {
    let js = async_nats::jetstream::new(client.clone());
    ensure_stream(&js).await?;
    let stream = js.get_stream(DEAD_LETTER_STREAM).await?;
    let durable = format!("notify-dlq-list-{}", nanoid!(6));
    let consumer = stream
        .create_consumer(PullConfig {
            durable_name: Some(durable),
            deliver_policy: DeliverPolicy::All,
            ack_policy: AckPolicy::None,
            filter_subject: DEAD_LETTER_SUBJECT.into(),
            ..Default::default()
        })
        .await?;
    let mut messages = consumer.fetch().max_messages(limit).messages().await?;
    let mut out = Vec::new();
    while let Some(msg) = messages.try_next().await.map_err(|e| anyhow::anyhow!(e))? {
        if let Ok(record) = serde_json::from_slice::<DlqRecord>(&msg.payload) {
            out.push(DlqEntry {
                sequence: msg.info().map(|info| info.stream_sequence).unwrap_or(0),
                record,
            });
        }
    }
    Ok(out)
}

pub async fn get_entry(client: &Client, sequence: u64) -> Result<Option<DlqEntry>> {
    let js = async_nats::jetstream::new(client.clone());
    match js.get_stream(DEAD_LETTER_STREAM).await {
        Ok(stream) => match stream.direct_get(sequence).await {
            Ok(message) => Ok(serde_json::from_slice::<DlqRecord>(&message.payload)
                .ok()
                .map(|record| DlqEntry { sequence, record })),
            Err(err) => {
                warn!(%err, "failed to fetch dead-letter message");
                Ok(None)
            }
        },
        Err(_) => Ok(None),
    }
}

/// Republishes a dead-lettered message back onto its channel's work queue
/// with a reset retry count, for operator-triggered redelivery. Entries
/// with no decoded message (the delivery never parsed in the first place)
/// have nothing to replay and return an error instead.
pub async fn replay_entry(client: &Client, entry: &DlqEntry) -> Result<()> {
    let Some(mut message) = entry.record.message.clone() else {
        bail!("dlq entry {} has no decodable message to replay", entry.sequence);
    };
    message.retry_count = 0;
    let subject = notify_core::subjects::channel_subject(message.channel);
    let payload = serde_json::to_vec(&message).context("serializing replayed message")?;
    client.publish(subject.clone(), payload.into()).await.with_context(|| format!("replay publish to {subject}"))?;
    Ok(())
}

pub async fn replay_entries(client: &Client, limit: usize) -> Result<Vec<DlqEntry>> {
    let js = async_nats::jetstream::new(client.clone());
    ensure_stream(&js).await?;
    let stream = js.get_stream(DEAD_LETTER_STREAM).await?;
    let durable = format!("notify-dlq-replay-{}", nanoid!(6));
    let consumer = stream
        .create_consumer(PullConfig {
            durable_name: Some(durable),
            deliver_policy: DeliverPolicy::All,
            ack_policy: AckPolicy::Explicit,
            filter_subject: DEAD_LETTER_SUBJECT.into(),
            ..Default::default()
        })
        .await?;
    let mut messages = consumer.fetch().max_messages(limit).messages().await?;
    let mut processed = Vec::new();
    while let Some(msg) = messages.try_next().await.map_err(|e| anyhow::anyhow!(e))? {
        let sequence = msg.info().map(|info| info.stream_sequence).unwrap_or(0);
        match serde_json::from_slice::<DlqRecord>(&msg.payload) {
            Ok(record) => {
                let entry = DlqEntry { record, sequence };
                if let Err(err) = replay_entry(client, &entry).await {
                    warn!(%err, sequence, "skipping dlq entry with nothing to replay");
                    msg.ack().await.map_err(|e| anyhow::anyhow!(e))?;
                    continue;
                }
                msg.ack().await.map_err(|e| anyhow::anyhow!(e))?;
                processed.push(entry);
            }
            Err(err) => {
                warn!(%err, "failed to parse dead-letter record");
                msg.ack().await.map_err(|e| anyhow::anyhow!(e))?;
            }
        }
    }
    Ok(processed)
}

/// Test double that records dead-lettered messages in memory instead of
/// talking to a broker.
#[derive(Clone, Default)]
pub struct InMemoryDlqSink {
    entries: std::sync::Arc<tokio::sync::Mutex<Vec<(QueueMessage, DlqError)>>>,
    raw_entries: std::sync::Arc<tokio::sync::Mutex<Vec<(Vec<u8>, DlqError)>>>,
}

impl InMemoryDlqSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<(QueueMessage, DlqError)> {
        self.entries.lock().await.clone()
    }

    pub async fn raw_entries(&self) -> Vec<(Vec<u8>, DlqError)> {
        self.raw_entries.lock().await.clone()
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDlqSink {
    async fn publish(&self, message: QueueMessage, error: DlqError) -> Result<()> {
        self.entries.lock().await.push((message, error));
        Ok(())
    }

    async fn publish_raw(&self, raw: Vec<u8>, error: DlqError) -> Result<()> {
        self.raw_entries.lock().await.push((raw, error));
        Ok(())
    }
}
