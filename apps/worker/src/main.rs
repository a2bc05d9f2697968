mod config;
mod pipeline;

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use notify_core::{Channel, QueueMessage};
use notify_dlq::{DeadLetterSink, DlqError, DlqPublisher};
use notify_idempotency::{cache_from_env, IdempotencyCache};
use notify_queue::{bootstrap, MessagePublisher, Publisher};
use tracing::{error, info, warn};

use config::Config;
use pipeline::{handle_message, WorkerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    notify_telemetry::init_tracing("notify-worker");

    let config = Config::from_env();
    info!(nats_url = %config.nats_url, "notify-worker starting");

    let nats = notify_queue::connect_with_retry(&config.nats_url).await?;
    let publisher: Arc<dyn MessagePublisher> = Arc::new(Publisher::new(nats.clone()).await?);
    let dlq: Arc<dyn DeadLetterSink> = Arc::new(DlqPublisher::new(nats.clone()).await?);
    let idempotency = Arc::new(cache_from_env(&config.idempotency).await);

    let mut tasks = Vec::new();
    for channel in Channel::all() {
        let nats = nats.clone();
        let publisher = publisher.clone();
        let dlq = dlq.clone();
        let idempotency = idempotency.clone();
        let worker_config = config.worker;
        let max_ack_pending = config.max_ack_pending;
        tasks.push(tokio::spawn(async move {
            if let Err(err) = run_channel(channel, nats, max_ack_pending, publisher, dlq, idempotency, worker_config).await
            {
                error!(%err, %channel, "channel consumer loop exited with error");
            }
        }));
    }

    shutdown_signal().await;
    info!("shutdown signal received, waiting for in-flight deliveries to drain");
    for task in tasks {
        task.abort();
    }
    Ok(())
}

async fn run_channel(
    channel: Channel,
    nats: async_nats::Client,
    max_ack_pending: i64,
    publisher: Arc<dyn MessagePublisher>,
    dlq: Arc<dyn DeadLetterSink>,
    idempotency: Arc<IdempotencyCache>,
    worker_config: WorkerConfig,
) -> Result<()> {
    let mut consumer = bootstrap(&nats, channel, max_ack_pending).await?;
    info!(%channel, "attached to channel work queue");

    while let Some(next) = consumer.messages.next().await {
        let msg = match next {
            Ok(msg) => msg,
            Err(err) => {
                warn!(%err, %channel, "error reading from consumer stream, continuing");
                continue;
            }
        };

        let parsed: Result<QueueMessage, _> = serde_json::from_slice(&msg.payload);
        match parsed {
            Ok(message) => {
                let sender = notify_senders::for_channel(channel);
                handle_message(message, &idempotency, publisher.as_ref(), dlq.as_ref(), sender.as_ref(), &worker_config)
                    .await;
                if let Err(err) = msg.ack().await {
                    warn!(%err, %channel, "failed to ack delivered message");
                }
            }
            Err(err) => {
                error!(%err, %channel, "failed to decode queue message, dead-lettering raw delivery");
                let dlq_error = DlqError { code: "E_DECODE".into(), message: err.to_string() };
                if let Err(dlq_err) = dlq.publish_raw(msg.payload.to_vec(), dlq_error).await {
                    error!(%dlq_err, %channel, "failed to record undecodable delivery in dead-letter queue");
                }
                if let Err(ack_err) = msg.ack().await {
                    warn!(%ack_err, %channel, "failed to ack undecodable delivery");
                }
                metrics::counter!("notifications_decode_failures_total", "channel" => channel.as_str()).increment(1);
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
