use crate::validate::ValidationError;

/// Errors surfaced by ingress request handling, one variant per disposition
/// the HTTP layer needs to map to a status code.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("failed to publish notification")]
    Publish(#[source] anyhow::Error),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl NotifyError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            NotifyError::Validation(_) => 400,
            NotifyError::RateLimited { .. } => 429,
            NotifyError::Publish(_) => 500,
            NotifyError::Internal(_) => 500,
        }
    }
}
