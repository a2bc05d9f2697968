//! Shared contracts for the notification delivery pipeline: wire types,
//! validation, the sender trait, and the typed errors ingress surfaces.

pub mod error;
pub mod send;
pub mod subjects;
pub mod types;
pub mod validate;

pub use error::NotifyError;
pub use send::{NotificationSender, SendError, SendOutcome};
pub use types::{
    Channel, EmailPayload, NotificationRequest, NotificationResponse, Payload, PushPayload,
    QueueMessage, ResponseStatus, SmsPayload, UnknownChannel,
};
pub use validate::{validate_request, ValidationError, ValidationIssue};
