//! Per-connection WebSocket session actor
//!
//! Each connection gets one actor: it registers itself with the
//! [`ConnectionRegistry`] on start, relays inbound client messages to the
//! registry/hub, and writes outbound frames handed to its mailbox. Heartbeat
//! pings detect dead peers; connections that never authenticate are dropped
//! once the auth window closes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, Handler, Running, StreamHandler};
use actix_web_actors::ws;
use tracing::{debug, warn};

use template_gateway_core::models::TeamActivity;
use template_gateway_core::store::ComplianceStore;

use super::hub::BroadcastHub;
use super::messages::{ClientMessage, OutboundFrame, ServerMessage};
use super::registry::{ConnectionId, ConnectionRegistry};

/// How often the server pings the client
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Drop the connection if no pong arrives within this window
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);
/// Drop the connection if no auth message arrives within this window
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WsSession {
    id: Option<ConnectionId>,
    user_id: Option<String>,
    account_id: Option<String>,
    authenticated: bool,
    hb: Instant,
    registry: Arc<ConnectionRegistry>,
    hub: Arc<BroadcastHub>,
    store: Arc<dyn ComplianceStore>,
}

impl WsSession {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        hub: Arc<BroadcastHub>,
        store: Arc<dyn ComplianceStore>,
    ) -> Self {
        Self {
            id: None,
            user_id: None,
            account_id: None,
            authenticated: false,
            hb: Instant::now(),
            registry,
            hub,
            store,
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!(connection_id = ?act.id, "Heartbeat timeout, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn start_auth_deadline(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_later(AUTH_TIMEOUT, |act, ctx| {
            if !act.authenticated {
                warn!(connection_id = ?act.id, "Authentication window expired");
                act.send(ctx, &ServerMessage::error("authentication timeout"));
                ctx.stop();
            }
        });
    }

    fn send(&self, ctx: &mut ws::WebsocketContext<Self>, message: &ServerMessage) {
        match message.to_json() {
            Ok(frame) => ctx.text(frame),
            Err(e) => warn!(error = %e, "Failed to serialize outbound message"),
        }
    }

    fn handle_client_message(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Unparseable client message");
                self.send(ctx, &ServerMessage::error(format!("invalid message: {}", e)));
                return;
            }
        };

        let Some(id) = self.id else {
            return;
        };

        if requires_auth(&message) && !self.authenticated {
            self.send(ctx, &ServerMessage::error("not authenticated"));
            return;
        }

        match message {
            ClientMessage::Auth {
                user_id,
                account_id,
                ..
            } => {
                self.registry.authenticate(id, &user_id);
                self.authenticated = true;
                self.user_id = Some(user_id.clone());
                self.account_id = account_id;
                self.send(ctx, &ServerMessage::AuthSuccess { user_id });
            }
            ClientMessage::JoinRoom { room } => {
                self.registry.join(id, &room);
                self.send(ctx, &ServerMessage::RoomJoined { room: room.clone() });
                self.notify_room(id, &room, |user_id| ServerMessage::UserJoinedRoom {
                    room: room.clone(),
                    user_id,
                });
            }
            ClientMessage::LeaveRoom { room } => {
                self.registry.leave(id, &room);
                self.notify_room(id, &room, |user_id| ServerMessage::UserLeftRoom {
                    room: room.clone(),
                    user_id,
                });
            }
            ClientMessage::TemplateEditing { room, payload } => {
                let user_id = self.current_user();
                if let Err(e) = self.hub.publish_to_room_except(
                    &room,
                    id,
                    &ServerMessage::TemplateUpdate {
                        room: room.clone(),
                        user_id: user_id.clone(),
                        payload,
                    },
                ) {
                    warn!(error = %e, room, "Failed to broadcast template edit");
                }
                self.record_activity(user_id, "template_editing".to_string(), Some(room));
            }
            ClientMessage::CursorPosition { room, payload } => {
                let user_id = self.current_user();
                if let Err(e) = self.hub.publish_to_room_except(
                    &room,
                    id,
                    &ServerMessage::CursorUpdate {
                        room: room.clone(),
                        user_id,
                        payload,
                    },
                ) {
                    warn!(error = %e, "Failed to broadcast cursor position");
                }
            }
            ClientMessage::TeamActivity { action, target } => {
                let user_id = self.current_user();
                if let Err(e) = self.hub.publish_all(&ServerMessage::TeamActivity {
                    user_id: user_id.clone(),
                    action: action.clone(),
                    target: target.clone(),
                }) {
                    warn!(error = %e, "Failed to broadcast team activity");
                }
                self.record_activity(user_id, action, target);
            }
            ClientMessage::Ping => {
                self.send(ctx, &ServerMessage::Pong);
            }
            ClientMessage::Pong => {
                self.hb = Instant::now();
            }
        }
    }

    fn notify_room<F>(&self, id: ConnectionId, room: &str, build: F)
    where
        F: FnOnce(String) -> ServerMessage,
    {
        let message = build(self.current_user());
        if let Err(e) = self.hub.publish_to_room_except(room, id, &message) {
            warn!(error = %e, room, "Failed to notify room");
        }
    }

    fn current_user(&self) -> String {
        self.user_id.clone().unwrap_or_else(|| "anonymous".to_string())
    }

    /// Persist a team activity record off the actor thread. Failures are
    /// logged; collaboration never blocks on the store.
    fn record_activity(&self, user_id: String, action: String, target: Option<String>) {
        let store = Arc::clone(&self.store);
        let account_id = self
            .account_id
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        actix::spawn(async move {
            let activity = TeamActivity::new(account_id, user_id, action, target);
            if let Err(e) = store.create_team_activity(activity).await {
                warn!(error = %e, "Failed to record team activity");
            }
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let id = self.registry.register(ctx.address().recipient());
        self.id = Some(id);
        self.start_heartbeat(ctx);
        self.start_auth_deadline(ctx);
        self.send(ctx, &ServerMessage::Connected { connection_id: id });
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        if let Some(id) = self.id.take() {
            let rooms = self.registry.deregister(id);
            if self.authenticated {
                let user_id = self.current_user();
                for room in rooms {
                    let message = ServerMessage::UserLeftRoom {
                        room: room.clone(),
                        user_id: user_id.clone(),
                    };
                    if let Err(e) = self.hub.publish(&room, &message) {
                        warn!(error = %e, room, "Failed to announce departure");
                    }
                }
            }
        }
        Running::Stop
    }
}

impl Handler<OutboundFrame> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundFrame, ctx: &mut Self::Context) {
        match msg {
            OutboundFrame::Text(frame) => ctx.text(frame),
            OutboundFrame::Close => {
                ctx.close(Some(ws::CloseCode::Away.into()));
                ctx.stop();
            }
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.hb = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.handle_client_message(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                self.send(ctx, &ServerMessage::error("binary frames not supported"));
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// Everything except auth and heartbeat frames requires a completed auth.
fn requires_auth(message: &ClientMessage) -> bool {
    !matches!(
        message,
        ClientMessage::Auth { .. } | ClientMessage::Ping | ClientMessage::Pong
    )
}
