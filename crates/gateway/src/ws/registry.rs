//! WebSocket connection registry
//!
//! Single source of truth for connection membership: which connections exist,
//! which user each belongs to, and which rooms each has joined. All three
//! maps live behind one `RwLock` so every mutation is atomic with respect to
//! fan-out snapshots; callers outside this module never see the lock, only
//! snapshot copies.

use std::collections::{HashMap, HashSet};

use actix::Recipient;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::messages::OutboundFrame;

pub type ConnectionId = Uuid;

struct ConnectionEntry {
    recipient: Recipient<OutboundFrame>,
    user_id: Option<String>,
    rooms: HashSet<String>,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
    users: HashMap<String, HashSet<ConnectionId>>,
}

/// Registry of live WebSocket connections and their room/user membership
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection and return its generated id.
    pub fn register(&self, recipient: Recipient<OutboundFrame>) -> ConnectionId {
        let id = Uuid::new_v4();
        let mut inner = self.inner.write();
        inner.connections.insert(
            id,
            ConnectionEntry {
                recipient,
                user_id: None,
                rooms: HashSet::new(),
            },
        );
        info!(connection_id = %id, total = inner.connections.len(), "Connection registered");
        id
    }

    /// Bind a user id to a connection after authentication. Returns `false`
    /// if the connection is unknown.
    pub fn authenticate(&self, id: ConnectionId, user_id: &str) -> bool {
        let mut inner = self.inner.write();
        let RegistryInner {
            connections, users, ..
        } = &mut *inner;
        let Some(entry) = connections.get_mut(&id) else {
            return false;
        };
        // Re-auth under a different user moves the connection between user sets
        if let Some(previous) = entry.user_id.replace(user_id.to_string()) {
            if let Some(set) = users.get_mut(&previous) {
                set.remove(&id);
                if set.is_empty() {
                    users.remove(&previous);
                }
            }
        }
        users.entry(user_id.to_string()).or_default().insert(id);
        debug!(connection_id = %id, user_id, "Connection authenticated");
        true
    }

    /// Remove a connection from every room and user set atomically. Returns
    /// the rooms it was a member of so callers can announce the departure.
    pub fn deregister(&self, id: ConnectionId) -> Vec<String> {
        let mut inner = self.inner.write();
        let Some(entry) = inner.connections.remove(&id) else {
            return Vec::new();
        };
        for room in &entry.rooms {
            if let Some(members) = inner.rooms.get_mut(room) {
                members.remove(&id);
                if members.is_empty() {
                    inner.rooms.remove(room);
                }
            }
        }
        if let Some(user_id) = &entry.user_id {
            if let Some(set) = inner.users.get_mut(user_id) {
                set.remove(&id);
                if set.is_empty() {
                    inner.users.remove(user_id);
                }
            }
        }
        info!(connection_id = %id, total = inner.connections.len(), "Connection deregistered");
        entry.rooms.into_iter().collect()
    }

    /// Join a room. Idempotent; returns `false` if the connection is unknown.
    pub fn join(&self, id: ConnectionId, room: &str) -> bool {
        let mut inner = self.inner.write();
        let RegistryInner {
            connections, rooms, ..
        } = &mut *inner;
        let Some(entry) = connections.get_mut(&id) else {
            return false;
        };
        entry.rooms.insert(room.to_string());
        rooms.entry(room.to_string()).or_default().insert(id);
        debug!(connection_id = %id, room, "Joined room");
        true
    }

    /// Leave a room. A no-op if the connection is not a member.
    pub fn leave(&self, id: ConnectionId, room: &str) {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.connections.get_mut(&id) {
            entry.rooms.remove(room);
        }
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
    }

    /// Connection ids currently in a room.
    pub fn members_of(&self, room: &str) -> HashSet<ConnectionId> {
        self.inner
            .read()
            .rooms
            .get(room)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of recipients in a room, taken under the lock.
    pub fn room_recipients(&self, room: &str) -> Vec<(ConnectionId, Recipient<OutboundFrame>)> {
        let inner = self.inner.read();
        let Some(members) = inner.rooms.get(room) else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|id| {
                inner
                    .connections
                    .get(id)
                    .map(|entry| (*id, entry.recipient.clone()))
            })
            .collect()
    }

    /// Snapshot of every connected recipient.
    pub fn all_recipients(&self) -> Vec<(ConnectionId, Recipient<OutboundFrame>)> {
        self.inner
            .read()
            .connections
            .iter()
            .map(|(id, entry)| (*id, entry.recipient.clone()))
            .collect()
    }

    /// Snapshot of every connection authenticated as `user_id`.
    pub fn user_recipients(&self, user_id: &str) -> Vec<(ConnectionId, Recipient<OutboundFrame>)> {
        let inner = self.inner.read();
        let Some(ids) = inner.users.get(user_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| {
                inner
                    .connections
                    .get(id)
                    .map(|entry| (*id, entry.recipient.clone()))
            })
            .collect()
    }

    pub fn user_id_of(&self, id: ConnectionId) -> Option<String> {
        self.inner
            .read()
            .connections
            .get(&id)
            .and_then(|entry| entry.user_id.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.inner.read().connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix::{Actor, Context, Handler};
    use std::sync::Arc;

    struct Sink;

    impl Actor for Sink {
        type Context = Context<Self>;
    }

    impl Handler<OutboundFrame> for Sink {
        type Result = ();
        fn handle(&mut self, _msg: OutboundFrame, _ctx: &mut Context<Self>) {}
    }

    #[actix_rt::test]
    async fn join_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let recipient = Sink.start().recipient();
        let id = registry.register(recipient);

        assert!(registry.join(id, "template:tpl-1"));
        assert!(registry.join(id, "template:tpl-1"));
        assert_eq!(registry.members_of("template:tpl-1").len(), 1);
    }

    #[actix_rt::test]
    async fn leave_unknown_room_is_noop() {
        let registry = ConnectionRegistry::new();
        let id = registry.register(Sink.start().recipient());
        registry.leave(id, "template:tpl-9");
        assert_eq!(registry.connection_count(), 1);
    }

    #[actix_rt::test]
    async fn join_unknown_connection_is_rejected() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.join(Uuid::new_v4(), "template:tpl-1"));
        assert!(registry.members_of("template:tpl-1").is_empty());
    }

    #[actix_rt::test]
    async fn deregister_removes_all_membership() {
        let registry = Arc::new(ConnectionRegistry::new());
        let id = registry.register(Sink.start().recipient());
        registry.authenticate(id, "u1");
        registry.join(id, "template:a");
        registry.join(id, "template:b");

        let mut rooms = registry.deregister(id);
        rooms.sort();
        assert_eq!(rooms, vec!["template:a", "template:b"]);
        assert!(registry.members_of("template:a").is_empty());
        assert!(registry.user_recipients("u1").is_empty());
        assert_eq!(registry.connection_count(), 0);
    }

    #[actix_rt::test]
    async fn reauthentication_moves_user_binding() {
        let registry = ConnectionRegistry::new();
        let id = registry.register(Sink.start().recipient());
        assert!(registry.authenticate(id, "u1"));
        assert!(registry.authenticate(id, "u2"));
        assert!(registry.user_recipients("u1").is_empty());
        assert_eq!(registry.user_recipients("u2").len(), 1);
        assert_eq!(registry.user_id_of(id).as_deref(), Some("u2"));
    }
}
