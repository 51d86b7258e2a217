/// Per-connection actor.
///
/// A session is bound to one authenticated user and one conversation for its
/// whole lifetime; authentication and the membership check happen in
/// handler.rs before the actor exists. Outbound frames travel through an mpsc
/// channel bridged back to the websocket in handler.rs. Async work (DB calls)
/// runs via `ctx.spawn()` + `into_actor()`.
use actix::prelude::*;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::modules::conversation::repository_pg::{
    ConversationPgRepository, ParticipantPgRepository,
};
use crate::modules::message::model::SendMessage;
use crate::modules::message::repository_pg::MessagePgRepository;
use crate::modules::message::service::MessageService;
use crate::modules::read_tracking::repository_pg::ReadReceiptPgRepository;
use crate::modules::read_tracking::service::ReadTrackingService;

use super::events::*;
use super::message::{ClientMessage, ServerMessage};
use super::server::ChatServer;

pub type MessageSvc = MessageService<
    ConversationPgRepository,
    ParticipantPgRepository,
    MessagePgRepository,
    ReadReceiptPgRepository,
>;

pub type ReadSvc = ReadTrackingService<
    ConversationPgRepository,
    ParticipantPgRepository,
    MessagePgRepository,
    ReadReceiptPgRepository,
>;

pub struct WebSocketSession {
    pub id: Uuid,
    pub user_id: Uuid,
    /// The one room this connection belongs to.
    pub conversation_id: Uuid,
    pub server: Addr<ChatServer>,
    /// Outbound JSON frames (bridge to handler.rs and the websocket).
    pub tx: mpsc::UnboundedSender<String>,
    /// None in unit tests.
    pub message_service: Option<actix_web::web::Data<MessageSvc>>,
    pub read_service: Option<actix_web::web::Data<ReadSvc>>,
}

impl WebSocketSession {
    pub fn new(
        user_id: Uuid,
        conversation_id: Uuid,
        server: Addr<ChatServer>,
        tx: mpsc::UnboundedSender<String>,
        message_service: actix_web::web::Data<MessageSvc>,
        read_service: actix_web::web::Data<ReadSvc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            conversation_id,
            server,
            tx,
            message_service: Some(message_service),
            read_service: Some(read_service),
        }
    }

    fn send_to_client(&self, msg: &ServerMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = self.tx.send(json) {
                    tracing::error!("Failed to push frame to client (session {}): {}", self.id, e);
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize ServerMessage (session {}): {}", self.id, e);
            }
        }
    }

    fn handle_client_message(&mut self, msg: ClientMessage, ctx: &mut Context<Self>) {
        match msg {
            ClientMessage::SendMessage { content, reply_to } => {
                self.handle_send_message(content, reply_to, ctx);
            }

            ClientMessage::MarkAsRead { message_id } => {
                self.handle_mark_as_read(message_id, ctx);
            }

            ClientMessage::Typing => self.broadcast_typing(true),

            ClientMessage::StopTyping => self.broadcast_typing(false),

            ClientMessage::Ping => self.send_to_client(&ServerMessage::Pong),
        }
    }

    /// Persists the message. The service notifies the room itself, so the
    /// session only has to surface failures.
    fn handle_send_message(
        &self,
        content: String,
        reply_to: Option<Uuid>,
        ctx: &mut Context<Self>,
    ) {
        let Some(service) = self.message_service.clone() else {
            self.send_to_client(&ServerMessage::Error {
                message: "Message service unavailable".to_string(),
            });
            return;
        };

        let (user_id, conversation_id) = (self.user_id, self.conversation_id);
        let tx = self.tx.clone();
        let session_id = self.id;

        ctx.spawn(
            async move {
                let payload = SendMessage { content, reply_to, _type: None };
                if let Err(e) = service.send_message(conversation_id, user_id, payload).await {
                    tracing::warn!(
                        "Failed to send message (session {}, conversation {}): {}",
                        session_id,
                        conversation_id,
                        e
                    );
                    let err = ServerMessage::Error { message: "Could not send message".to_string() };
                    if let Ok(json) = serde_json::to_string(&err) {
                        let _ = tx.send(json);
                    }
                }
            }
            .into_actor(self),
        );
    }

    fn handle_mark_as_read(&self, message_id: Uuid, ctx: &mut Context<Self>) {
        let Some(service) = self.read_service.clone() else {
            self.send_to_client(&ServerMessage::Error {
                message: "Read tracking service unavailable".to_string(),
            });
            return;
        };

        let (user_id, conversation_id) = (self.user_id, self.conversation_id);
        let server = self.server.clone();
        let tx = self.tx.clone();

        ctx.spawn(
            async move {
                match service.mark_message_read(message_id, user_id).await {
                    Ok(_) => {
                        server.do_send(BroadcastToRoom {
                            conversation_id,
                            message: ServerMessage::MessageRead { message_id, user_id },
                            skip_user_id: None,
                        });
                    }
                    Err(e) => {
                        tracing::warn!("Failed to mark message {} as read: {}", message_id, e);
                        let err = ServerMessage::Error {
                            message: "Could not mark message as read".to_string(),
                        };
                        if let Ok(json) = serde_json::to_string(&err) {
                            let _ = tx.send(json);
                        }
                    }
                }
            }
            .into_actor(self),
        );
    }

    /// Typing indicators are transient: no persistence, not echoed back.
    fn broadcast_typing(&self, is_typing: bool) {
        self.server.do_send(BroadcastToRoom {
            conversation_id: self.conversation_id,
            message: ServerMessage::UserTyping { user_id: self.user_id, is_typing },
            skip_user_id: Some(self.user_id),
        });
    }
}

impl Actor for WebSocketSession {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!("WebSocket session started: {}", self.id);

        self.server.do_send(Connect {
            session_id: self.id,
            user_id: self.user_id,
            conversation_id: self.conversation_id,
            addr: ctx.address(),
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("WebSocket session stopped: {}", self.id);

        self.server.do_send(Disconnect { session_id: self.id });
    }
}

impl Message for ClientMessage {
    type Result = ();
}

/// Inbound frames parsed in handler.rs land here.
impl Handler<ClientMessage> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, msg: ClientMessage, ctx: &mut Context<Self>) {
        self.handle_client_message(msg, ctx);
    }
}

/// Events from the chat server are serialized and pushed to the client.
impl Handler<ServerMessage> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, msg: ServerMessage, _ctx: &mut Context<Self>) {
        self.send_to_client(&msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(server: Addr<ChatServer>) -> (Addr<WebSocketSession>, mpsc::UnboundedReceiver<String>)
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = WebSocketSession {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            conversation_id: Uuid::now_v7(),
            server,
            tx,
            message_service: None,
            read_service: None,
        };
        (actor.start(), rx)
    }

    #[actix_web::test]
    async fn ping_is_answered_with_pong() {
        let server = ChatServer::new().start();
        let (addr, mut rx) = session(server);

        addr.send(ClientMessage::Ping).await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), r#"{"type":"pong"}"#);
    }

    #[actix_web::test]
    async fn send_without_service_reports_an_error_frame() {
        let server = ChatServer::new().start();
        let (addr, mut rx) = session(server);

        addr.send(ClientMessage::SendMessage { content: "hi".to_string(), reply_to: None })
            .await
            .unwrap();

        assert!(rx.try_recv().unwrap().contains("\"type\":\"error\""));
    }
}
