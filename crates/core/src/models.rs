//! Domain models for template compliance tracking
//!
//! These types mirror the rows the gateway persists through the
//! [`ComplianceStore`](crate::store::ComplianceStore) collaborator: compliance
//! events raised by webhook notifications, the webhook audit log, the minimal
//! template projection the webhook path mutates, and team activity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::{classify, Classification};

/// Ordered severity scale for compliance events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Traffic-light status attached to every compliance event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Safe,
    Warning,
    Danger,
}

impl EventStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "safe" => Some(Self::Safe),
            "warning" => Some(Self::Warning),
            "danger" => Some(Self::Danger),
            _ => None,
        }
    }
}

impl Severity {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Kinds of compliance events the gateway records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StatusUpdate,
    CategoryUpdate,
    SubmissionFailed,
    UserReported,
    TemplateSubmitted,
}

/// Template lifecycle status as reported by the messaging provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Approved,
    Rejected,
    Pending,
    Paused,
    Draft,
}

impl TemplateStatus {
    /// Map a provider status-update event string (e.g. `APPROVED`) to a status.
    pub fn from_provider_event(event: &str) -> Option<Self> {
        match event {
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "PENDING" => Some(Self::Pending),
            "PAUSED" => Some(Self::Paused),
            _ => None,
        }
    }
}

/// Provider template category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Marketing,
    Utility,
    Authentication,
}

impl TemplateCategory {
    pub fn from_provider(value: &str) -> Option<Self> {
        match value {
            "MARKETING" => Some(Self::Marketing),
            "UTILITY" => Some(Self::Utility),
            "AUTHENTICATION" => Some(Self::Authentication),
            _ => None,
        }
    }
}

/// Minimal template projection used by the webhook path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub language: Option<String>,
    pub status: TemplateStatus,
    pub category: Option<TemplateCategory>,
    pub updated_at: DateTime<Utc>,
}

/// Field-level template update applied by webhook changes
#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    pub status: Option<TemplateStatus>,
    pub category: Option<TemplateCategory>,
}

/// A compliance event raised against an account (and usually a template)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceEvent {
    pub id: Uuid,
    pub account_id: String,
    pub template_id: Option<String>,
    pub event_type: EventType,
    pub status: EventStatus,
    pub severity: Severity,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ComplianceEvent {
    /// Build an event whose status and severity come from the classifier.
    ///
    /// The `metadata` bag doubles as the classification payload: for
    /// `status_update` events it carries the provider `event` key the
    /// classifier inspects; for `user_reported` events it may carry caller
    /// `status`/`severity` overrides.
    pub fn classified(
        account_id: impl Into<String>,
        template_id: Option<String>,
        event_type: EventType,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        let Classification { status, severity } = classify(event_type, &metadata);
        Self {
            id: Uuid::new_v4(),
            account_id: account_id.into(),
            template_id,
            event_type,
            status,
            severity,
            message: message.into(),
            metadata,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Stamp the resolution time. Idempotent: resolving an already resolved
    /// event leaves the original timestamp in place.
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        if self.resolved_at.is_none() {
            self.resolved_at = Some(at);
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// Audit record for every webhook POST, written before any processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookLog {
    pub id: Uuid,
    pub account_id: Option<String>,
    pub webhook_type: String,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub response_time_ms: Option<u64>,
}

/// Fields supplied when creating a webhook log entry
#[derive(Debug, Clone)]
pub struct NewWebhookLog {
    pub account_id: Option<String>,
    pub webhook_type: String,
    pub payload: serde_json::Value,
}

/// A collaborative action performed by a team member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamActivity {
    pub id: Uuid,
    pub account_id: String,
    pub user_id: String,
    pub action: String,
    pub target: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TeamActivity {
    pub fn new(
        account_id: impl Into<String>,
        user_id: impl Into<String>,
        action: impl Into<String>,
        target: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: account_id.into(),
            user_id: user_id.into(),
            action: action.into(),
            target,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut event = ComplianceEvent::classified(
            "acct-1",
            Some("tpl-1".to_string()),
            EventType::StatusUpdate,
            "Template rejected",
            json!({ "event": "REJECTED" }),
        );
        assert!(!event.is_resolved());

        let first = Utc::now();
        event.resolve(first);
        assert_eq!(event.resolved_at, Some(first));

        let later = first + chrono::Duration::seconds(60);
        event.resolve(later);
        assert_eq!(event.resolved_at, Some(first));
    }

    #[test]
    fn provider_status_mapping() {
        assert_eq!(
            TemplateStatus::from_provider_event("APPROVED"),
            Some(TemplateStatus::Approved)
        );
        assert_eq!(TemplateStatus::from_provider_event("FLAGGED"), None);
    }

    #[test]
    fn event_serializes_snake_case() {
        let event = ComplianceEvent::classified(
            "acct-1",
            None,
            EventType::CategoryUpdate,
            "Category changed",
            json!({}),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "category_update");
        assert_eq!(value["status"], "warning");
        assert_eq!(value["severity"], "high");
    }
}
