//! Channel sender implementations the worker dispatches to. Only stub
//! providers ship today; a real SMTP/SMS-gateway/push client would implement
//! `notify_core::NotificationSender` the same way and slot in at `for_channel`.

pub mod stub;

pub use stub::{StubEmailSender, StubPushSender, StubSmsSender};

use std::sync::Arc;

use notify_core::{Channel, NotificationSender};

pub fn for_channel(channel: Channel) -> Arc<dyn NotificationSender> {
    match channel {
        Channel::Email => Arc::new(StubEmailSender),
        Channel::Sms => Arc::new(StubSmsSender),
        Channel::Push => Arc::new(StubPushSender),
    }
}
