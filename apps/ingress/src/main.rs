mod config;
mod error;
mod handlers;
mod reqid;
mod state;

use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::{middleware, Router};

use config::Config;
use reqid::with_request_id;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    notify_telemetry::init_tracing("notify-ingress");

    let config = Config::from_env()?;
    tracing::info!(bind = %config.bind, nats_url = %config.nats_url, "notify-ingress starting");

    let nats = notify_queue::connect_with_retry(&config.nats_url).await?;
    let publisher = Arc::new(notify_queue::Publisher::new(nats.clone()).await?);
    let dlq = Arc::new(notify_dlq::DlqPublisher::new(nats.clone()).await?);
    let rate_limiter = notify_ratelimit::limiter_from_env(&config.rate_limit).await;
    let idempotency = Arc::new(notify_idempotency::cache_from_env(&config.idempotency).await);

    let state = AppState {
        rate_limiter,
        idempotency,
        publisher,
        dlq,
        rate_limit_quota: config.rate_limit.quota,
        rate_limit_window_secs: config.rate_limit.window_secs,
        nats: Some(nats.clone()),
    };

    let app = Router::new()
        .route("/api/notifications/email", post(handlers::send_email))
        .route("/api/notifications/sms", post(handlers::send_sms))
        .route("/api/notifications/push", post(handlers::send_push))
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .layer(middleware::from_fn(with_request_id))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("notify-ingress listening on {}", config.bind);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
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
    tracing::info!("shutdown signal received, draining in-flight requests");
}
