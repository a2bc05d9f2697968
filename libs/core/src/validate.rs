use crate::types::{EmailPayload, NotificationRequest, Payload, PushPayload, SmsPayload};

/// A single field-level validation failure, mirroring the shape clients need
/// to render a "bad request" error back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All issues found on one request; empty `issues` is never constructed —
/// use `validate_request`'s `Result` instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed: {}", issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Validates the envelope fields plus whichever payload variant is present.
pub fn validate_request(req: &NotificationRequest) -> ValidationResult<()> {
    let mut issues = Vec::new();

    if req.user_id.trim().is_empty() {
        issues.push(ValidationIssue::new("userId", "userId required for rate limiting"));
    }
    if req.idempotency_key.trim().is_empty() {
        issues.push(ValidationIssue::new("idempotencyKey", "idempotencyKey is required"));
    }

    match &req.payload {
        Payload::Email(p) => validate_email(p, &mut issues),
        Payload::Sms(p) => validate_sms(p, &mut issues),
        Payload::Push(p) => validate_push(p, &mut issues),
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}

fn looks_like_email(addr: &str) -> bool {
    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn validate_email(p: &EmailPayload, issues: &mut Vec<ValidationIssue>) {
    if !looks_like_email(&p.to) {
        issues.push(ValidationIssue::new("payload.to", "must be a valid RFC-5322 address"));
    }
    if p.subject.trim().is_empty() {
        issues.push(ValidationIssue::new("payload.subject", "subject must not be empty"));
    }
    if p.body.trim().is_empty() {
        issues.push(ValidationIssue::new("payload.body", "body must not be empty"));
    }
    for (idx, addr) in p.cc.iter().chain(p.bcc.iter()).enumerate() {
        if !looks_like_email(addr) {
            issues.push(ValidationIssue::new(
                "payload.cc/bcc",
                format!("address #{idx} ({addr}) is not a valid RFC-5322 address"),
            ));
        }
    }
}

fn validate_sms(p: &SmsPayload, issues: &mut Vec<ValidationIssue>) {
    if p.to.len() < 10 {
        issues.push(ValidationIssue::new("payload.to", "must be at least 10 characters"));
    }
    let len = p.message.chars().count();
    if len == 0 || len > 160 {
        issues.push(ValidationIssue::new("payload.message", "must be 1-160 characters"));
    }
}

fn validate_push(p: &PushPayload, issues: &mut Vec<ValidationIssue>) {
    if p.device_token.trim().is_empty() {
        issues.push(ValidationIssue::new("payload.deviceToken", "deviceToken must not be empty"));
    }
    if p.title.trim().is_empty() {
        issues.push(ValidationIssue::new("payload.title", "title must not be empty"));
    }
    if p.body.trim().is_empty() {
        issues.push(ValidationIssue::new("payload.body", "body must not be empty"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NotificationRequest;

    fn valid_email_request() -> NotificationRequest {
        NotificationRequest {
            user_id: "u1".into(),
            idempotency_key: "k1".into(),
            payload: Payload::Email(EmailPayload {
                to: "a@b.com".into(),
                subject: "s".into(),
                body: "b".into(),
                cc: vec![],
                bcc: vec![],
            }),
        }
    }

    #[test]
    fn accepts_valid_email_request() {
        assert!(validate_request(&valid_email_request()).is_ok());
    }

    #[test]
    fn rejects_missing_user_id() {
        let mut req = valid_email_request();
        req.user_id = "".into();
        let err = validate_request(&req).unwrap_err();
        assert!(err.issues.iter().any(|i| i.field == "userId"));
    }

    #[test]
    fn rejects_bad_email_address() {
        let mut req = valid_email_request();
        if let Payload::Email(p) = &mut req.payload {
            p.to = "not-an-email".into();
        }
        let err = validate_request(&req).unwrap_err();
        assert!(err.issues.iter().any(|i| i.field == "payload.to"));
    }

    #[test]
    fn rejects_sms_too_short_recipient() {
        let req = NotificationRequest {
            user_id: "u1".into(),
            idempotency_key: "k1".into(),
            payload: Payload::Sms(SmsPayload {
                to: "123".into(),
                message: "hi".into(),
            }),
        };
        let err = validate_request(&req).unwrap_err();
        assert!(err.issues.iter().any(|i| i.field == "payload.to"));
    }

    #[test]
    fn rejects_sms_message_over_160_chars() {
        let req = NotificationRequest {
            user_id: "u1".into(),
            idempotency_key: "k1".into(),
            payload: Payload::Sms(SmsPayload {
                to: "+15551234567".into(),
                message: "x".repeat(161),
            }),
        };
        let err = validate_request(&req).unwrap_err();
        assert!(err.issues.iter().any(|i| i.field == "payload.message"));
    }

    #[test]
    fn rejects_push_missing_device_token() {
        let req = NotificationRequest {
            user_id: "u1".into(),
            idempotency_key: "k1".into(),
            payload: Payload::Push(PushPayload {
                device_token: "".into(),
                title: "t".into(),
                body: "b".into(),
                data: None,
            }),
        };
        let err = validate_request(&req).unwrap_err();
        assert!(err.issues.iter().any(|i| i.field == "payload.deviceToken"));
    }
}
