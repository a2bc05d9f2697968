use crate::types::Channel;

/// NATS subject a channel's work queue is fed on — doubles as the AMQP
/// routing key an equivalent broker would use.
pub fn channel_subject(channel: Channel) -> String {
    format!("notify.{}", channel.as_str())
}

/// Subject the dead-letter stream listens on.
pub const DEAD_LETTER_SUBJECT: &str = "notify.dead";

/// JetStream stream name backing a channel's durable work queue.
pub fn channel_stream(channel: Channel) -> String {
    format!("notify-{}", channel.as_str())
}

pub const DEAD_LETTER_STREAM: &str = "notify-dlq";

/// Shared-store key for the sliding-window rate-limit bucket.
pub fn rate_limit_key(user_id: &str, channel: Channel) -> String {
    format!("ratelimit:{user_id}:{}", channel.as_str())
}

/// Shared-store key for the pre-publish idempotency response cache.
pub fn idempotency_key(user_id: &str, idempotency_key: &str) -> String {
    format!("idempotency:{user_id}:{idempotency_key}")
}

/// Shared-store key for the delivery-side dedup guard.
pub fn delivered_key(user_id: &str, idempotency_key: &str) -> String {
    format!("delivered:{user_id}:{idempotency_key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_use_the_documented_prefixes() {
        assert_eq!(rate_limit_key("u1", Channel::Sms), "ratelimit:u1:sms");
        assert_eq!(idempotency_key("u1", "k1"), "idempotency:u1:k1");
        assert_eq!(delivered_key("u1", "k1"), "delivered:u1:k1");
        assert_eq!(channel_subject(Channel::Email), "notify.email");
    }
}
