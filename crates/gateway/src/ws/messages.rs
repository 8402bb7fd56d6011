//! Socket message envelopes
//!
//! Every frame on the wire is a tagged envelope `{ "type": ..., "data": ... }`.
//! Inbound frames deserialize into [`ClientMessage`]; anything with an
//! unrecognized `type` fails to parse and is answered with an `error`
//! envelope. Outbound frames are built from [`ServerMessage`] and serialized
//! exactly once before fan-out.

use actix::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use template_gateway_core::models::ComplianceEvent;
use uuid::Uuid;

/// Frame delivered to a session actor's mailbox
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub enum OutboundFrame {
    /// Serialized `ServerMessage` JSON to write to the socket
    Text(String),
    /// Close the socket and stop the session
    Close,
}

/// Messages a client may send over the socket
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth {
        user_id: String,
        account_id: Option<String>,
        token: Option<String>,
    },
    JoinRoom {
        room: String,
    },
    LeaveRoom {
        room: String,
    },
    TemplateEditing {
        room: String,
        payload: Value,
    },
    CursorPosition {
        room: String,
        payload: Value,
    },
    TeamActivity {
        action: String,
        target: Option<String>,
    },
    Ping,
    Pong,
}

/// Messages the server emits to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        connection_id: Uuid,
    },
    AuthSuccess {
        user_id: String,
    },
    RoomJoined {
        room: String,
    },
    UserJoinedRoom {
        room: String,
        user_id: String,
    },
    UserLeftRoom {
        room: String,
        user_id: String,
    },
    TemplateUpdate {
        room: String,
        user_id: String,
        payload: Value,
    },
    CursorUpdate {
        room: String,
        user_id: String,
        payload: Value,
    },
    ComplianceAlert {
        event: ComplianceEvent,
    },
    TeamActivity {
        user_id: String,
        action: String,
        target: Option<String>,
    },
    Error {
        message: String,
    },
    Pong,
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
