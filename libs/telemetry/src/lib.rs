//! Lightweight tracing + metrics facade shared by `notify-ingress` and
//! `notify-worker`. Logging sinks and metrics collectors are external
//! collaborators here, not something this crate exports to, so only the
//! local `tracing-subscriber` fmt layer and the `metrics` facade are wired
//! up — see DESIGN.md for the dependency-drop note.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: OnceLock<()> = OnceLock::new();
static JSON_LOGS: AtomicBool = AtomicBool::new(false);

/// Initializes the process-wide tracing subscriber. Safe to call more than
/// once; only the first call takes effect.
pub fn init_tracing(service_name: &str) {
    if INIT.get().is_some() {
        return;
    }
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    JSON_LOGS.store(json, Ordering::SeqCst);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry.with(fmt::layer().json().flatten_event(true)).try_init().ok();
    } else {
        registry.with(fmt::layer()).try_init().ok();
    }

    INIT.set(()).ok();
    tracing::info!(service = service_name, "telemetry initialized");
}

/// Attaches the common correlation fields to a span so log lines within it
/// carry user/channel/message identity without repeating them by hand.
pub fn with_common_fields(span: &Span, user_id: &str, channel: Option<&str>, msg_id: Option<&str>) {
    span.record("user_id", tracing::field::display(user_id));
    if let Some(channel) = channel {
        span.record("channel", tracing::field::display(channel));
    }
    if let Some(msg_id) = msg_id {
        span.record("msg_id", tracing::field::display(msg_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing("test-service");
        init_tracing("test-service");
    }
}
