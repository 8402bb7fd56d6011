//! Webhook processing pipeline
//!
//! Log first, then parse, then apply each change: resolve the template,
//! update its row, classify a compliance event, persist it, and publish it to
//! the template room and the global feed. A failing change is recorded and
//! the batch continues; nothing in this module makes the provider retry.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use template_gateway_core::models::{
    ComplianceEvent, EventType, NewWebhookLog, Template, TemplateCategory, TemplateStatus,
    TemplateUpdate,
};
use template_gateway_core::store::ComplianceStore;

use crate::ws::BroadcastHub;

use super::{CategoryChange, ChangeDetail, StatusChange, WebhookEnvelope, WebhookError};

/// Outcome of one webhook POST
#[derive(Debug)]
pub struct IngestOutcome {
    pub log_id: Uuid,
    pub events: Vec<ComplianceEvent>,
    pub errors: Vec<String>,
}

pub struct WebhookProcessor {
    store: Arc<dyn ComplianceStore>,
    hub: Arc<BroadcastHub>,
}

impl WebhookProcessor {
    pub fn new(store: Arc<dyn ComplianceStore>, hub: Arc<BroadcastHub>) -> Self {
        Self { store, hub }
    }

    /// Run the full pipeline for one raw POST body.
    ///
    /// The only hard failure is the initial log write; everything after the
    /// payload is on record degrades to entries in the log's
    /// `processing_error`.
    pub async fn ingest(&self, raw: &[u8]) -> Result<IngestOutcome, WebhookError> {
        let started = Instant::now();

        let payload: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            // Unparseable bodies still get logged, as a JSON string
            Err(_) => Value::String(String::from_utf8_lossy(raw).into_owned()),
        };
        let account_hint = payload
            .pointer("/entry/0/id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let webhook_type = payload
            .get("object")
            .and_then(Value::as_str)
            .unwrap_or("template_update")
            .to_string();

        let log = self
            .store
            .create_webhook_log(NewWebhookLog {
                account_id: account_hint,
                webhook_type,
                payload: payload.clone(),
            })
            .await?;

        let envelope = match serde_json::from_value::<WebhookEnvelope>(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                let error = format!("malformed envelope: {}", e);
                warn!(log_id = %log.id, %error, "Webhook payload rejected");
                self.mark_processed(log.id, Some(error.clone()), started)
                    .await;
                return Ok(IngestOutcome {
                    log_id: log.id,
                    events: Vec::new(),
                    errors: vec![error],
                });
            }
        };

        let mut events = Vec::new();
        let mut errors = Vec::new();
        for entry in &envelope.entry {
            for change in &entry.changes {
                match self.apply_change(&entry.id, change.detail()).await {
                    Ok(Some(event)) => events.push(event),
                    Ok(None) => {}
                    Err(e) => errors.push(e.to_string()),
                }
            }
        }

        let error_note = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        self.mark_processed(log.id, error_note, started).await;

        info!(
            log_id = %log.id,
            events = events.len(),
            errors = errors.len(),
            "Webhook processed"
        );
        Ok(IngestOutcome {
            log_id: log.id,
            events,
            errors,
        })
    }

    async fn apply_change(
        &self,
        account_id: &str,
        detail: Result<ChangeDetail, WebhookError>,
    ) -> Result<Option<ComplianceEvent>, WebhookError> {
        match detail? {
            ChangeDetail::StatusUpdate(change) => self.apply_status_update(account_id, change).await,
            ChangeDetail::CategoryUpdate(change) => {
                self.apply_category_update(account_id, change).await
            }
        }
    }

    async fn apply_status_update(
        &self,
        account_id: &str,
        change: StatusChange,
    ) -> Result<Option<ComplianceEvent>, WebhookError> {
        let Some(template) = self
            .find_template(account_id, &change.message_template_name)
            .await?
        else {
            return Ok(None);
        };

        let update = TemplateUpdate {
            status: TemplateStatus::from_provider_event(&change.event),
            category: None,
        };
        self.store
            .update_template_by_account_and_name(account_id, &change.message_template_name, update)
            .await?;

        let mut message = format!(
            "Template '{}' status changed to {}",
            change.message_template_name, change.event
        );
        if let Some(reason) = &change.reason {
            message.push_str(&format!(" ({})", reason));
        }

        let metadata = json!({
            "event": change.event,
            "previous_status": template.status,
            "language": change.message_template_language,
            "reason": change.reason,
        });
        self.persist_and_publish(account_id, Some(template.id), EventType::StatusUpdate, message, metadata)
            .await
            .map(Some)
    }

    async fn apply_category_update(
        &self,
        account_id: &str,
        change: CategoryChange,
    ) -> Result<Option<ComplianceEvent>, WebhookError> {
        let Some(template) = self
            .find_template(account_id, &change.message_template_name)
            .await?
        else {
            return Ok(None);
        };

        let update = TemplateUpdate {
            status: None,
            category: TemplateCategory::from_provider(&change.new_category),
        };
        self.store
            .update_template_by_account_and_name(account_id, &change.message_template_name, update)
            .await?;

        let message = format!(
            "Template '{}' category changed from {} to {}",
            change.message_template_name,
            change.previous_category.as_deref().unwrap_or("unknown"),
            change.new_category
        );
        let metadata = json!({
            "previous_category": change.previous_category,
            "new_category": change.new_category,
        });
        self.persist_and_publish(
            account_id,
            Some(template.id),
            EventType::CategoryUpdate,
            message,
            metadata,
        )
        .await
        .map(Some)
    }

    async fn find_template(
        &self,
        account_id: &str,
        name: &str,
    ) -> Result<Option<Template>, WebhookError> {
        let template = self
            .store
            .find_template_by_account_and_name(account_id, name)
            .await?;
        if template.is_none() {
            // Unknown templates are skipped, not errors; the provider may
            // notify about templates this deployment never created.
            debug!(account_id, name, "Webhook references unknown template");
        }
        Ok(template)
    }

    async fn persist_and_publish(
        &self,
        account_id: &str,
        template_id: Option<String>,
        event_type: EventType,
        message: String,
        metadata: Value,
    ) -> Result<ComplianceEvent, WebhookError> {
        let event = self
            .store
            .create_compliance_event(ComplianceEvent::classified(
                account_id,
                template_id,
                event_type,
                message,
                metadata,
            ))
            .await?;
        if let Err(e) = self.hub.publish_event(&event) {
            // Broadcast is best-effort; the event is already on record
            warn!(event_id = %event.id, error = %e, "Failed to broadcast compliance event");
        }
        Ok(event)
    }

    async fn mark_processed(&self, log_id: Uuid, error: Option<String>, started: Instant) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Err(e) = self
            .store
            .mark_webhook_processed(log_id, error, elapsed_ms)
            .await
        {
            warn!(log_id = %log_id, error = %e, "Failed to mark webhook log processed");
        }
    }
}
