use chrono::SecondsFormat;
use serde::Serialize;

use crate::db_core::prelude::*;

use super::redaction::redact_secrets;

/// Minimal, sanitized form of a persisted email, as the model sees it.
/// Immutable once built and discarded after the prompt is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailInput {
    pub id: String,
    pub sender_address: String,
    pub received_at: String,
    pub subject: String,
    pub body: String,
}

impl EmailInput {
    pub fn from_model(email: &email::Model) -> Self {
        Self {
            id: email.id.clone(),
            sender_address: email.sender_address.clone(),
            received_at: email.received_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            subject: redact_secrets(&email.subject),
            body: redact_secrets(&email.body),
        }
    }
}
