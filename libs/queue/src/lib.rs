//! Durable work queue over NATS JetStream: one stream per channel, explicit
//! acks, and a reconnect-with-backoff helper shared by both binaries.

pub mod connect;
pub mod consumer;
pub mod publisher;

pub use connect::connect_with_retry;
pub use consumer::{bootstrap, ChannelConsumer};
pub use publisher::{InMemoryPublisher, MessagePublisher, Publisher};
