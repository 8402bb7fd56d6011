//! Severity classification for compliance events
//!
//! A pure, total mapping from an event type and its payload to a
//! `(status, severity)` pair. Classification happens exactly once, before an
//! event is persisted or broadcast; consumers treat the stored pair as
//! authoritative and never reclassify.

use serde_json::Value;

use crate::models::{EventStatus, EventType, Severity};

/// Result of classifying an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: EventStatus,
    pub severity: Severity,
}

impl Classification {
    const fn new(status: EventStatus, severity: Severity) -> Self {
        Self { status, severity }
    }
}

/// Fallback for unrecognized inputs
const DEFAULT: Classification = Classification::new(EventStatus::Warning, Severity::Medium);

/// Classify an event into a status and severity.
///
/// `status_update` events read the provider status from the payload `event`
/// key; `user_reported` events honor caller-supplied `status` and `severity`
/// keys. Anything unrecognized falls back to `(warning, medium)`.
pub fn classify(event_type: EventType, payload: &Value) -> Classification {
    match event_type {
        EventType::TemplateSubmitted => Classification::new(EventStatus::Safe, Severity::Low),
        EventType::SubmissionFailed => Classification::new(EventStatus::Danger, Severity::High),
        EventType::CategoryUpdate => Classification::new(EventStatus::Warning, Severity::High),
        EventType::StatusUpdate => classify_status_update(payload),
        EventType::UserReported => classify_user_report(payload),
    }
}

fn classify_status_update(payload: &Value) -> Classification {
    match payload.get("event").and_then(Value::as_str) {
        Some("APPROVED") => Classification::new(EventStatus::Safe, Severity::Low),
        Some("REJECTED") => Classification::new(EventStatus::Danger, Severity::Medium),
        Some("PENDING") => Classification::new(EventStatus::Warning, Severity::Low),
        Some("PAUSED") => Classification::new(EventStatus::Warning, Severity::Medium),
        _ => DEFAULT,
    }
}

fn classify_user_report(payload: &Value) -> Classification {
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .and_then(EventStatus::parse)
        .unwrap_or(EventStatus::Warning);
    let severity = payload
        .get("severity")
        .and_then(Value::as_str)
        .and_then(Severity::parse)
        .unwrap_or(Severity::Medium);
    Classification { status, severity }
}
