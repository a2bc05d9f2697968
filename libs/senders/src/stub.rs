use async_trait::async_trait;
use notify_core::send::{NotificationSender, SendError, SendOutcome};
use notify_core::types::{Channel, Payload};
use tracing::info;

/// Reads the `FORCE_FAILURE` escape hatch senders use to drive retry and
/// dead-letter paths in integration tests without a real provider account.
/// Valid values are `retriable` and `terminal`; anything else is ignored.
fn forced_outcome(channel: Channel) -> Option<SendOutcome> {
    let raw = std::env::var("FORCE_FAILURE").ok()?;
    match raw.as_str() {
        "retriable" => Some(SendOutcome::Retriable(SendError::new(
            "forced_retriable",
            format!("{} send forced to fail retriably", channel.as_str()),
        ))),
        "terminal" => Some(SendOutcome::Terminal(SendError::new(
            "forced_terminal",
            format!("{} send forced to fail terminally", channel.as_str()),
        ))),
        _ => None,
    }
}

/// Stub sender for the email channel. Logs instead of calling an SMTP
/// relay; `FORCE_FAILURE` drives the failure paths under test.
pub struct StubEmailSender;

#[async_trait]
impl NotificationSender for StubEmailSender {
    async fn send(&self, payload: &Payload) -> SendOutcome {
        if let Some(outcome) = forced_outcome(Channel::Email) {
            return outcome;
        }
        let Payload::Email(email) = payload else {
            return SendOutcome::Terminal(SendError::new("wrong_channel", "expected email payload"));
        };
        info!(to = %email.to, subject = %email.subject, "stub email sent");
        SendOutcome::Ok
    }
}

pub struct StubSmsSender;

#[async_trait]
impl NotificationSender for StubSmsSender {
    async fn send(&self, payload: &Payload) -> SendOutcome {
        if let Some(outcome) = forced_outcome(Channel::Sms) {
            return outcome;
        }
        let Payload::Sms(sms) = payload else {
            return SendOutcome::Terminal(SendError::new("wrong_channel", "expected sms payload"));
        };
        info!(to = %sms.to, "stub sms sent");
        SendOutcome::Ok
    }
}

pub struct StubPushSender;

#[async_trait]
impl NotificationSender for StubPushSender {
    async fn send(&self, payload: &Payload) -> SendOutcome {
        if let Some(outcome) = forced_outcome(Channel::Push) {
            return outcome;
        }
        let Payload::Push(push) = payload else {
            return SendOutcome::Terminal(SendError::new("wrong_channel", "expected push payload"));
        };
        info!(device_token = %push.device_token, title = %push.title, "stub push sent");
        SendOutcome::Ok
    }
}

#[cfg(test)]
mod tests {
    use notify_core::types::{EmailPayload, PushPayload, SmsPayload};
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[tokio::test]
    async fn email_sends_ok_by_default() {
        let _guard = env_lock().lock().unwrap();
        std::env::remove_var("FORCE_FAILURE");
        let payload = Payload::Email(EmailPayload {
            to: "a@b.c".into(),
            subject: "hi".into(),
            body: "body".into(),
            cc: vec![],
            bcc: vec![],
        });
        assert!(matches!(StubEmailSender.send(&payload).await, SendOutcome::Ok));
    }

    #[tokio::test]
    async fn force_failure_retriable_is_honored() {
        let _guard = env_lock().lock().unwrap();
        std::env::set_var("FORCE_FAILURE", "retriable");
        let payload = Payload::Sms(SmsPayload { to: "+15551234567".into(), message: "hi".into() });
        let outcome = StubSmsSender.send(&payload).await;
        assert!(matches!(outcome, SendOutcome::Retriable(_)));
        std::env::remove_var("FORCE_FAILURE");
    }

    #[tokio::test]
    async fn force_failure_terminal_is_honored() {
        let _guard = env_lock().lock().unwrap();
        std::env::set_var("FORCE_FAILURE", "terminal");
        let payload = Payload::Push(PushPayload {
            device_token: "tok".into(),
            title: "t".into(),
            body: "b".into(),
            data: None,
        });
        let outcome = StubPushSender.send(&payload).await;
        assert!(matches!(outcome, SendOutcome::Terminal(_)));
        std::env::remove_var("FORCE_FAILURE");
    }
}
