//! # Template Gateway Core
//!
//! Shared building blocks for the template compliance gateway: domain models,
//! the severity classifier, the persistence contract, configuration loading,
//! telemetry, and graceful shutdown.
//!
//! ## Modules
//!
//! - `models`: Domain models for compliance events, templates, and audit logs
//! - `classifier`: Pure severity/status classification
//! - `store`: `ComplianceStore` trait and the in-memory implementation
//! - `config`: Configuration loading and validation
//! - `telemetry`: Tracing subscriber initialization
//! - `shutdown`: Graceful shutdown coordinator
//! - `error`: Error types

pub mod classifier;
pub mod config;
pub mod error;
pub mod models;
pub mod shutdown;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use classifier::{classify, Classification};
pub use config::{load_dotenv, ConfigLoader, ServiceConfig, WebhookConfig};
pub use error::{CoreError, StoreError};
pub use models::{
    ComplianceEvent, EventStatus, EventType, NewWebhookLog, Severity, TeamActivity, Template,
    TemplateCategory, TemplateStatus, TemplateUpdate, WebhookLog,
};
pub use shutdown::{ShutdownConfig, ShutdownCoordinator};
pub use store::{ComplianceStore, MemoryStore};
pub use telemetry::init_tracing;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
