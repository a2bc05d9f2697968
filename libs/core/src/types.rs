use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One of the three delivery mediums this system knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
        }
    }

    pub fn all() -> [Channel; 3] {
        [Channel::Email, Channel::Sms, Channel::Push]
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            "push" => Ok(Channel::Push),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown channel: {0}")]
pub struct UnknownChannel(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsPayload {
    pub to: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub device_token: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,
}

/// Discriminated payload union, tagged with the channel-specific variant
/// alongside its data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Email(EmailPayload),
    Sms(SmsPayload),
    Push(PushPayload),
}

impl Payload {
    pub fn channel(&self) -> Channel {
        match self {
            Payload::Email(_) => Channel::Email,
            Payload::Sms(_) => Channel::Sms,
            Payload::Push(_) => Channel::Push,
        }
    }
}

/// Inbound body for `POST /api/notifications/{channel}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub user_id: String,
    pub idempotency_key: String,
    pub payload: Payload,
}

/// On-wire queue message, durably published per channel and re-published on retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub channel: Channel,
    pub user_id: String,
    pub idempotency_key: String,
    pub payload: Payload,
    pub timestamp: i64,
    pub retry_count: u32,
}

impl QueueMessage {
    pub fn new(user_id: String, idempotency_key: String, payload: Payload) -> Self {
        let channel = payload.channel();
        Self {
            id: Uuid::new_v4(),
            channel,
            user_id,
            idempotency_key,
            payload,
            timestamp: OffsetDateTime::now_utc().unix_timestamp() * 1000,
            retry_count: 0,
        }
    }

    /// Builds the next retry attempt: same identity and payload, incremented count.
    pub fn next_retry(&self) -> Self {
        Self {
            id: self.id,
            channel: self.channel,
            user_id: self.user_id.clone(),
            idempotency_key: self.idempotency_key.clone(),
            payload: self.payload.clone(),
            timestamp: OffsetDateTime::now_utc().unix_timestamp() * 1000,
            retry_count: self.retry_count + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Queued,
    Duplicate,
}

/// Outbound acknowledgement, also what gets cached under the idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub status: ResponseStatus,
    pub message: String,
}

impl NotificationResponse {
    pub fn queued(id: Uuid) -> Self {
        Self {
            id,
            status: ResponseStatus::Queued,
            message: "notification queued for delivery".to_string(),
        }
    }

    pub fn as_duplicate(&self) -> Self {
        Self {
            id: self.id,
            status: ResponseStatus::Duplicate,
            message: "duplicate request; returning prior result".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_round_trips_through_str() {
        for ch in Channel::all() {
            assert_eq!(Channel::from_str(ch.as_str()).unwrap(), ch);
        }
        assert!(Channel::from_str("fax").is_err());
    }

    #[test]
    fn queue_message_next_retry_increments_count_and_keeps_id() {
        let msg = QueueMessage::new(
            "u1".into(),
            "k1".into(),
            Payload::Sms(SmsPayload {
                to: "+15551234567".into(),
                message: "hi".into(),
            }),
        );
        let retry = msg.next_retry();
        assert_eq!(retry.id, msg.id);
        assert_eq!(retry.retry_count, 1);
        assert_eq!(retry.channel, Channel::Sms);
    }

    #[test]
    fn payload_tag_serializes_lowercase() {
        let payload = Payload::Email(EmailPayload {
            to: "a@b.c".into(),
            subject: "s".into(),
            body: "b".into(),
            cc: vec![],
            bcc: vec![],
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "email");
    }

    #[test]
    fn notification_request_parses_camel_case() {
        let raw = serde_json::json!({
            "userId": "u1",
            "idempotencyKey": "k1",
            "payload": { "type": "push", "deviceToken": "tok", "title": "t", "body": "b" }
        });
        let req: NotificationRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.user_id, "u1");
        assert_eq!(req.idempotency_key, "k1");
        assert_eq!(req.payload.channel(), Channel::Push);
    }
}
