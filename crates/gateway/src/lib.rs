//! # Template Gateway
//!
//! Gateway service between a third-party messaging provider's template
//! webhooks and real-time collaboration clients. Webhook notifications are
//! verified, logged, classified into compliance events, persisted, and
//! broadcast to WebSocket rooms.
//!
//! ## Modules
//!
//! - `webhooks`: Verification, typed payloads, and the processing pipeline
//! - `ws`: Connection registry, broadcast hub, session actor, wire messages
//! - `client`: Client-side reconnection agent with FIFO send queue
//! - `server`: HTTP surface and application assembly

pub mod client;
pub mod server;
pub mod webhooks;
pub mod ws;

pub use client::{AgentConfig, ClientError, MessageSink, ReconnectingClient, Transport};
pub use server::AppState;
pub use webhooks::processor::{IngestOutcome, WebhookProcessor};
pub use webhooks::WebhookError;
pub use ws::{BroadcastError, BroadcastHub, ConnectionRegistry, ServerMessage, WsSession};
