use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use notify_core::subjects::rate_limit_key;
use notify_core::{
    validate_request, EmailPayload, NotifyError, Payload, PushPayload, QueueMessage, SmsPayload,
};
use notify_dlq::{DeadLetterSink, DlqError as DeadLetterError};
use notify_queue::MessagePublisher;
use notify_ratelimit::{AdmitResult, RateLimiter};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest<P> {
    pub user_id: String,
    pub idempotency_key: String,
    pub payload: P,
}

pub async fn send_email(
    State(state): State<AppState>,
    Json(body): Json<InboundRequest<EmailPayload>>,
) -> Response {
    handle_send(&state, body.user_id, body.idempotency_key, Payload::Email(body.payload)).await
}

pub async fn send_sms(
    State(state): State<AppState>,
    Json(body): Json<InboundRequest<SmsPayload>>,
) -> Response {
    handle_send(&state, body.user_id, body.idempotency_key, Payload::Sms(body.payload)).await
}

pub async fn send_push(
    State(state): State<AppState>,
    Json(body): Json<InboundRequest<PushPayload>>,
) -> Response {
    handle_send(&state, body.user_id, body.idempotency_key, Payload::Push(body.payload)).await
}

fn rate_limit_headers(limit: u32, admit: &AdmitResult) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(limit));
    headers.insert(HeaderName::from_static("x-ratelimit-remaining"), HeaderValue::from(admit.remaining));
    headers.insert(HeaderName::from_static("x-ratelimit-reset"), HeaderValue::from(admit.reset_after_secs));
    headers
}

async fn handle_send(state: &AppState, user_id: String, idempotency_key: String, payload: Payload) -> Response {
    let channel = payload.channel();
    let request = notify_core::NotificationRequest { user_id, idempotency_key, payload };

    if let Err(validation) = validate_request(&request) {
        return ApiError::from(NotifyError::Validation(validation)).into_response();
    }

    let key = rate_limit_key(&request.user_id, channel);
    let admit = match state.rate_limiter.admit(&key, state.rate_limit_quota, state.rate_limit_window_secs).await {
        Ok(admit) => admit,
        Err(err) => {
            error!(%err, "rate limiter call failed unexpectedly");
            return ApiError::from(NotifyError::Internal(err)).into_response();
        }
    };
    let headers = rate_limit_headers(state.rate_limit_quota, &admit);

    if !admit.allowed {
        let mut response =
            ApiError::from(NotifyError::RateLimited { retry_after_secs: admit.reset_after_secs }).into_response();
        response.headers_mut().extend(headers);
        return response;
    }

    match state.idempotency.probe(&request.user_id, &request.idempotency_key).await {
        Ok(Some(cached)) => {
            info!(user_id = %request.user_id, idempotency_key = %request.idempotency_key, "duplicate request, returning cached response");
            let mut response = (
                StatusCode::OK,
                Json(json!({ "success": true, "data": cached.as_duplicate() })),
            )
                .into_response();
            response.headers_mut().extend(headers);
            return response;
        }
        Ok(None) => {}
        Err(err) => {
            warn!(%err, "idempotency probe failed, treating as not-duplicate");
        }
    }

    let message = QueueMessage::new(request.user_id.clone(), request.idempotency_key.clone(), request.payload);
    if let Err(err) = state.publisher.publish(&message).await {
        error!(%err, msg_id = %message.id, "failed to publish notification");
        if let Err(dlq_err) = state
            .dlq
            .publish(message, DeadLetterError { code: "E_PUBLISH".into(), message: err.to_string() })
            .await
        {
            error!(%dlq_err, "failed to record publish failure in dead-letter queue");
        }
        let mut response = ApiError::from(NotifyError::Publish(err)).into_response();
        response.headers_mut().extend(headers);
        return response;
    }

    let response_body = notify_core::NotificationResponse::queued(message.id);
    if let Err(err) = state.idempotency.store_response(&request.user_id, &request.idempotency_key, &response_body).await
    {
        warn!(%err, msg_id = %message.id, "failed to cache idempotency response after successful publish");
    }

    metrics::counter!("notifications_ingressed_total", "channel" => channel.as_str()).increment(1);

    let mut response = (
        StatusCode::ACCEPTED,
        Json(json!({ "success": true, "data": response_body })),
    )
        .into_response();
    response.headers_mut().extend(headers);
    response
}

pub async fn health(State(state): State<AppState>) -> Response {
    let connected = state.broker_connected();
    let status = if connected { "connected" } else { "disconnected" };
    Json(json!({
        "status": "ok",
        "timestamp": time::OffsetDateTime::now_utc().unix_timestamp(),
        "services": { "broker": status },
    }))
    .into_response()
}

pub async fn ready(State(state): State<AppState>) -> Response {
    if state.broker_connected() {
        Json(json!({ "ready": true })).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ready": false }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use http_body_util::BodyExt;
    use notify_dlq::InMemoryDlqSink;
    use notify_idempotency::{IdempotencyCache, InMemoryKvStore};
    use notify_queue::InMemoryPublisher;
    use notify_ratelimit::{FailOpenRateLimiter, InMemoryRateLimiter};
    use tower::ServiceExt;

    use super::*;

    fn test_state(quota: u32, window_secs: u64) -> (AppState, InMemoryPublisher) {
        let publisher = InMemoryPublisher::new();
        let state = AppState {
            rate_limiter: Arc::new(FailOpenRateLimiter::new(InMemoryRateLimiter::new())),
            idempotency: Arc::new(IdempotencyCache::new(Arc::new(InMemoryKvStore::new()), 3600, 86_400)),
            publisher: Arc::new(publisher.clone()),
            dlq: Arc::new(InMemoryDlqSink::new()),
            rate_limit_quota: quota,
            rate_limit_window_secs: window_secs,
            nats: None,
        };
        (state, publisher)
    }

    fn app(state: AppState) -> Router {
        Router::new().route("/api/notifications/email", post(send_email)).with_state(state)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn email_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/notifications/email")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn happy_path_queues_and_dedupes() {
        let (state, publisher) = test_state(50, 3600);
        let payload = serde_json::json!({
            "userId": "u1",
            "idempotencyKey": "k1",
            "payload": { "to": "a@b.c", "subject": "s", "body": "b" },
        });

        let response = app(state.clone()).oneshot(email_request(payload.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "queued");
        assert_eq!(publisher.published().await.len(), 1);

        let response = app(state).oneshot(email_request(payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "duplicate");
        assert_eq!(publisher.published().await.len(), 1, "duplicate must not re-publish");
    }

    #[tokio::test]
    async fn invalid_email_address_is_rejected() {
        let (state, _publisher) = test_state(50, 3600);
        let payload = serde_json::json!({
            "userId": "u1",
            "idempotencyKey": "k1",
            "payload": { "to": "not-an-email", "subject": "s", "body": "b" },
        });

        let response = app(state).oneshot(email_request(payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn exhausted_quota_returns_429_with_headers() {
        let (state, _publisher) = test_state(1, 3600);
        let first = serde_json::json!({
            "userId": "u1",
            "idempotencyKey": "k1",
            "payload": { "to": "a@b.c", "subject": "s", "body": "b" },
        });
        let second = serde_json::json!({
            "userId": "u1",
            "idempotencyKey": "k2",
            "payload": { "to": "a@b.c", "subject": "s", "body": "b" },
        });

        let response = app(state.clone()).oneshot(email_request(first)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = app(state).oneshot(email_request(second)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "0");
    }
}
