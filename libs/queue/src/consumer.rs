use anyhow::{Context, Result};
use async_nats::jetstream::consumer::push::{Config as PushConfig, Messages};
use async_nats::jetstream::consumer::AckPolicy;
use async_nats::jetstream::stream::{Config as StreamConfig, RetentionPolicy};
use async_nats::Client;
use notify_core::subjects::{channel_stream, channel_subject};
use notify_core::Channel;

/// A durable, explicit-ack push consumer attached to one channel's stream.
pub struct ChannelConsumer {
    pub channel: Channel,
    pub messages: Messages,
}

/// Ensures the channel's stream and a durable push consumer exist, then
/// attaches to its message stream. `max_ack_pending` bounds how many
/// in-flight (unacked) messages the worker can hold at once, the JetStream
/// equivalent of an AMQP prefetch count.
pub async fn bootstrap(client: &Client, channel: Channel, max_ack_pending: i64) -> Result<ChannelConsumer> {
    let js = async_nats::jetstream::new(client.clone());
    let stream_name = channel_stream(channel);
    let subject = channel_subject(channel);

    let stream_cfg = StreamConfig {
        name: stream_name.clone(),
        subjects: vec![subject.clone()],
        retention: RetentionPolicy::WorkQueue,
        max_messages: -1,
        max_messages_per_subject: -1,
        max_bytes: -1,
        ..Default::default()
    };
    let stream = js
        .get_or_create_stream(stream_cfg)
        .await
        .with_context(|| format!("ensure stream {stream_name}"))?;

    let deliver_subject = format!("deliver.notify.{}", channel.as_str());
    let consumer_name = format!("notify-worker-{}", channel.as_str());
    let consumer = stream
        .get_or_create_consumer(
            &consumer_name,
            PushConfig {
                durable_name: Some(consumer_name.clone()),
                deliver_subject,
                deliver_group: Some(consumer_name.clone()),
                filter_subject: subject,
                ack_policy: AckPolicy::Explicit,
                max_ack_pending,
                ..Default::default()
            },
        )
        .await
        .with_context(|| format!("ensure consumer {consumer_name}"))?;

    let messages = consumer
        .messages()
        .await
        .with_context(|| format!("attach consumer stream {consumer_name}"))?;

    Ok(ChannelConsumer { channel, messages })
}
