//! Persistence contract for the template compliance gateway
//!
//! The gateway only ever talks to storage through the [`ComplianceStore`]
//! trait; [`MemoryStore`] backs tests and local runs. Production deployments
//! plug in their own implementation behind the same trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    ComplianceEvent, NewWebhookLog, TeamActivity, Template, TemplateUpdate, WebhookLog,
};

/// Storage operations required by the webhook and collaboration paths
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    /// Persist a classified compliance event.
    async fn create_compliance_event(
        &self,
        event: ComplianceEvent,
    ) -> Result<ComplianceEvent, StoreError>;

    /// Mark an event resolved. Idempotent: resolving twice keeps the first
    /// resolution timestamp.
    async fn resolve_compliance_event(&self, id: Uuid) -> Result<ComplianceEvent, StoreError>;

    /// Look up a template by owning account and provider-facing name.
    async fn find_template_by_account_and_name(
        &self,
        account_id: &str,
        name: &str,
    ) -> Result<Option<Template>, StoreError>;

    /// Apply a field-level update to a template. Returns the updated row, or
    /// `None` when no such template exists.
    async fn update_template_by_account_and_name(
        &self,
        account_id: &str,
        name: &str,
        update: TemplateUpdate,
    ) -> Result<Option<Template>, StoreError>;

    /// Record a raw webhook payload before any processing happens.
    async fn create_webhook_log(&self, log: NewWebhookLog) -> Result<WebhookLog, StoreError>;

    /// Mark a webhook log processed, recording any processing error and the
    /// handling time.
    async fn mark_webhook_processed(
        &self,
        id: Uuid,
        error: Option<String>,
        response_time_ms: u64,
    ) -> Result<(), StoreError>;

    /// Record a collaborative team action.
    async fn create_team_activity(&self, activity: TeamActivity) -> Result<(), StoreError>;
}

/// In-memory store used by tests and the default binary wiring
#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<HashMap<Uuid, ComplianceEvent>>,
    templates: RwLock<HashMap<(String, String), Template>>,
    webhook_logs: RwLock<HashMap<Uuid, WebhookLog>>,
    activities: RwLock<Vec<TeamActivity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed a template row. Not part of the store trait; templates are
    /// created by the submission flow, which is outside the gateway.
    pub fn insert_template(&self, template: Template) {
        self.templates.write().insert(
            (template.account_id.clone(), template.name.clone()),
            template,
        );
    }

    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }

    pub fn events_for_account(&self, account_id: &str) -> Vec<ComplianceEvent> {
        let mut events: Vec<_> = self
            .events
            .read()
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.created_at);
        events
    }

    pub fn webhook_log(&self, id: Uuid) -> Option<WebhookLog> {
        self.webhook_logs.read().get(&id).cloned()
    }

    pub fn webhook_log_count(&self) -> usize {
        self.webhook_logs.read().len()
    }

    pub fn activity_count(&self) -> usize {
        self.activities.read().len()
    }
}

#[async_trait]
impl ComplianceStore for MemoryStore {
    async fn create_compliance_event(
        &self,
        event: ComplianceEvent,
    ) -> Result<ComplianceEvent, StoreError> {
        self.events.write().insert(event.id, event.clone());
        Ok(event)
    }

    async fn resolve_compliance_event(&self, id: Uuid) -> Result<ComplianceEvent, StoreError> {
        let mut events = self.events.write();
        let event = events
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("compliance event {}", id)))?;
        event.resolve(Utc::now());
        Ok(event.clone())
    }

    async fn find_template_by_account_and_name(
        &self,
        account_id: &str,
        name: &str,
    ) -> Result<Option<Template>, StoreError> {
        Ok(self
            .templates
            .read()
            .get(&(account_id.to_string(), name.to_string()))
            .cloned())
    }

    async fn update_template_by_account_and_name(
        &self,
        account_id: &str,
        name: &str,
        update: TemplateUpdate,
    ) -> Result<Option<Template>, StoreError> {
        let mut templates = self.templates.write();
        let Some(template) = templates.get_mut(&(account_id.to_string(), name.to_string())) else {
            return Ok(None);
        };
        if let Some(status) = update.status {
            template.status = status;
        }
        if let Some(category) = update.category {
            template.category = Some(category);
        }
        template.updated_at = Utc::now();
        Ok(Some(template.clone()))
    }

    async fn create_webhook_log(&self, log: NewWebhookLog) -> Result<WebhookLog, StoreError> {
        let entry = WebhookLog {
            id: Uuid::new_v4(),
            account_id: log.account_id,
            webhook_type: log.webhook_type,
            payload: log.payload,
            processed: false,
            processing_error: None,
            created_at: Utc::now(),
            response_time_ms: None,
        };
        self.webhook_logs.write().insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn mark_webhook_processed(
        &self,
        id: Uuid,
        error: Option<String>,
        response_time_ms: u64,
    ) -> Result<(), StoreError> {
        let mut logs = self.webhook_logs.write();
        let log = logs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("webhook log {}", id)))?;
        log.processed = true;
        log.processing_error = error;
        log.response_time_ms = Some(response_time_ms);
        Ok(())
    }

    async fn create_team_activity(&self, activity: TeamActivity) -> Result<(), StoreError> {
        self.activities.write().push(activity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, TemplateStatus};
    use serde_json::json;

    fn sample_template() -> Template {
        Template {
            id: "tpl-1".to_string(),
            account_id: "acct-1".to_string(),
            name: "order_update".to_string(),
            language: Some("en_US".to_string()),
            status: TemplateStatus::Pending,
            category: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn template_update_applies_fields() {
        let store = MemoryStore::new();
        store.insert_template(sample_template());

        let updated = store
            .update_template_by_account_and_name(
                "acct-1",
                "order_update",
                TemplateUpdate {
                    status: Some(TemplateStatus::Approved),
                    category: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TemplateStatus::Approved);

        let missing = store
            .update_template_by_account_and_name("acct-1", "nope", TemplateUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn resolve_event_is_idempotent() {
        let store = MemoryStore::new();
        let event = store
            .create_compliance_event(ComplianceEvent::classified(
                "acct-1",
                Some("tpl-1".to_string()),
                EventType::StatusUpdate,
                "Template rejected",
                json!({ "event": "REJECTED" }),
            ))
            .await
            .unwrap();

        let first = store.resolve_compliance_event(event.id).await.unwrap();
        let second = store.resolve_compliance_event(event.id).await.unwrap();
        assert_eq!(first.resolved_at, second.resolved_at);
        assert!(first.resolved_at.is_some());
    }

    #[tokio::test]
    async fn webhook_log_lifecycle() {
        let store = MemoryStore::new();
        let log = store
            .create_webhook_log(NewWebhookLog {
                account_id: Some("acct-1".to_string()),
                webhook_type: "template_update".to_string(),
                payload: json!({ "entry": [] }),
            })
            .await
            .unwrap();
        assert!(!log.processed);

        store
            .mark_webhook_processed(log.id, Some("boom".to_string()), 12)
            .await
            .unwrap();
        let stored = store.webhook_log(log.id).unwrap();
        assert!(stored.processed);
        assert_eq!(stored.processing_error.as_deref(), Some("boom"));
        assert_eq!(stored.response_time_ms, Some(12));
    }

    #[tokio::test]
    async fn resolve_missing_event_errors() {
        let store = MemoryStore::new();
        let result = store.resolve_compliance_event(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
