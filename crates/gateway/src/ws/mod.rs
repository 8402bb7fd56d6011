//! Real-time WebSocket layer: registry, broadcast hub, session actor, and
//! wire message envelopes.

pub mod hub;
pub mod messages;
pub mod registry;
pub mod session;

pub use hub::{BroadcastError, BroadcastHub};
pub use messages::{ClientMessage, OutboundFrame, ServerMessage};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use session::WsSession;
