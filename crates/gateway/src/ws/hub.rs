//! Broadcast hub
//!
//! Fan-out of server messages to registry snapshots. The hub serializes a
//! message once, then delivers the frame to each recipient with a
//! non-blocking `try_send`. A connection whose mailbox is full or whose actor
//! has stopped is deregistered on the spot; slow consumers are disconnected
//! rather than allowed to stall the fan-out. Delivery is at-most-once per
//! connection, with no queueing for absent members.

use std::sync::Arc;

use actix::Recipient;
use thiserror::Error;
use tracing::{debug, warn};

use template_gateway_core::models::ComplianceEvent;

use super::messages::{OutboundFrame, ServerMessage};
use super::registry::{ConnectionId, ConnectionRegistry};

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("Message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Publishes server messages to rooms, users, and the global feed
pub struct BroadcastHub {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastHub {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver a message to every member of a room. Returns the number of
    /// connections the frame was handed to.
    pub fn publish(&self, room: &str, message: &ServerMessage) -> Result<usize, BroadcastError> {
        let frame = message.to_json()?;
        let targets = self.registry.room_recipients(room);
        let delivered = self.deliver(targets, &frame);
        debug!(room, delivered, "Published room message");
        Ok(delivered)
    }

    /// Deliver a message to every room member except `sender`. Used for
    /// join/leave and collaborative edit notifications.
    pub fn publish_to_room_except(
        &self,
        room: &str,
        sender: ConnectionId,
        message: &ServerMessage,
    ) -> Result<usize, BroadcastError> {
        let frame = message.to_json()?;
        let targets: Vec<_> = self
            .registry
            .room_recipients(room)
            .into_iter()
            .filter(|(id, _)| *id != sender)
            .collect();
        Ok(self.deliver(targets, &frame))
    }

    /// Deliver a message to every connected client.
    pub fn publish_all(&self, message: &ServerMessage) -> Result<usize, BroadcastError> {
        let frame = message.to_json()?;
        let targets = self.registry.all_recipients();
        let delivered = self.deliver(targets, &frame);
        debug!(delivered, "Published global message");
        Ok(delivered)
    }

    /// Deliver a message to every connection authenticated as `user_id`.
    pub fn publish_to_user(
        &self,
        user_id: &str,
        message: &ServerMessage,
    ) -> Result<usize, BroadcastError> {
        let frame = message.to_json()?;
        let targets = self.registry.user_recipients(user_id);
        Ok(self.deliver(targets, &frame))
    }

    /// Publish a compliance event to its template room and the global feed.
    pub fn publish_event(&self, event: &ComplianceEvent) -> Result<(), BroadcastError> {
        let message = ServerMessage::ComplianceAlert {
            event: event.clone(),
        };
        if let Some(template_id) = &event.template_id {
            self.publish(&format!("template:{}", template_id), &message)?;
        }
        self.publish_all(&message)?;
        Ok(())
    }

    /// Close every connection and clear the registry.
    pub fn shutdown(&self) {
        let targets = self.registry.all_recipients();
        for (id, recipient) in targets {
            let _ = recipient.try_send(OutboundFrame::Close);
            self.registry.deregister(id);
        }
    }

    fn deliver(
        &self,
        targets: Vec<(ConnectionId, Recipient<OutboundFrame>)>,
        frame: &str,
    ) -> usize {
        let mut delivered = 0;
        for (id, recipient) in targets {
            match recipient.try_send(OutboundFrame::Text(frame.to_string())) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    // Mailbox full or actor gone: drop the connection, not the fan-out
                    warn!(connection_id = %id, error = %e, "Dropping undeliverable connection");
                    self.registry.deregister(id);
                }
            }
        }
        delivered
    }
}
