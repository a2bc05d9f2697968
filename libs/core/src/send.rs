use async_trait::async_trait;

use crate::types::Payload;

/// Outcome of a single send attempt: ok, retriable, or terminal.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Ok,
    Retriable(SendError),
    Terminal(SendError),
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct SendError {
    pub code: &'static str,
    pub message: String,
}

impl SendError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Implemented by the concrete SMTP/SMS-gateway/push-provider clients. The
/// core pipeline only ever calls through this trait; it never speaks a
/// wire protocol itself.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, payload: &Payload) -> SendOutcome;
}
