use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use notify_core::NotifyError;
use serde_json::json;
use tracing::error;

/// Newtype so `NotifyError` (defined in `notify-core`, with no axum
/// dependency) can still implement `IntoResponse` here at the HTTP edge.
pub struct ApiError(pub NotifyError);

impl From<NotifyError> for ApiError {
    fn from(err: NotifyError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &self.0 {
            NotifyError::Validation(validation) => json!({
                "success": false,
                "error": "validation failed",
                "details": validation.issues.iter().map(|i| json!({"field": i.field, "message": i.message})).collect::<Vec<_>>(),
            }),
            NotifyError::RateLimited { retry_after_secs } => json!({
                "success": false,
                "error": "rate limit exceeded",
                "retryAfter": retry_after_secs,
            }),
            NotifyError::Publish(err) => {
                error!(%err, "publish failed");
                json!({ "success": false, "error": "failed to publish notification" })
            }
            NotifyError::Internal(err) => {
                error!(%err, "internal error");
                json!({ "success": false, "error": "internal error" })
            }
        };

        (status, Json(body)).into_response()
    }
}
