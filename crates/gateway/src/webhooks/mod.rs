//! Webhook ingestion
//!
//! Receives template status notifications from the messaging provider,
//! verifies them at the edge, logs the raw payload, classifies the resulting
//! compliance events, and hands them to the broadcast hub. The POST surface
//! always answers 200 once logging has happened; provider redelivery is the
//! only retry mechanism.

pub mod processor;
pub mod verification;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use template_gateway_core::error::StoreError;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unsupported change field: {0}")]
    UnsupportedField(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Top-level webhook body: one envelope, many account entries
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

/// Per-account batch of changes
#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    /// Provider account id the changes belong to
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

/// A single change notification
#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    pub field: String,
    pub value: Value,
}

/// Typed view of a change's `value`, keyed by its `field`
#[derive(Debug)]
pub enum ChangeDetail {
    StatusUpdate(StatusChange),
    CategoryUpdate(CategoryChange),
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    /// New provider status, e.g. `APPROVED` or `REJECTED`
    pub event: String,
    pub message_template_name: String,
    #[serde(default)]
    pub message_template_language: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryChange {
    pub message_template_name: String,
    #[serde(default)]
    pub previous_category: Option<String>,
    pub new_category: String,
}

impl WebhookChange {
    /// Parse the untyped `value` into the detail for this change's field.
    pub fn detail(&self) -> Result<ChangeDetail, WebhookError> {
        match self.field.as_str() {
            "message_template_status_update" => {
                let detail = serde_json::from_value(self.value.clone())
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
                Ok(ChangeDetail::StatusUpdate(detail))
            }
            "template_category_update" => {
                let detail = serde_json::from_value(self.value.clone())
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
                Ok(ChangeDetail::CategoryUpdate(detail))
            }
            other => Err(WebhookError::UnsupportedField(other.to_string())),
        }
    }
}
