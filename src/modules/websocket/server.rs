/// Chat server actor.
///
/// Holds the registry of live sessions and conversation rooms and routes
/// events between them. A user may hold several sessions in the same room
/// (multiple devices); presence changes are only announced when the first
/// session arrives or the last one leaves.
use actix::prelude::*;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::events::*;
use super::message::ServerMessage;
use super::session::WebSocketSession;

struct SessionHandle {
    user_id: Uuid,
    conversation_id: Uuid,
    addr: Addr<WebSocketSession>,
}

pub struct ChatServer {
    /// session_id -> handle
    sessions: HashMap<Uuid, SessionHandle>,
    /// conversation_id -> session_ids
    rooms: HashMap<Uuid, HashSet<Uuid>>,
}

impl ChatServer {
    pub fn new() -> Self {
        Self { sessions: HashMap::new(), rooms: HashMap::new() }
    }

    fn broadcast(&self, conversation_id: &Uuid, message: ServerMessage, skip_user_id: Option<Uuid>) {
        let Some(room) = self.rooms.get(conversation_id) else {
            tracing::debug!("Broadcast to empty room {}", conversation_id);
            return;
        };

        let mut sent = 0;
        for session_id in room {
            let Some(handle) = self.sessions.get(session_id) else { continue };
            if skip_user_id == Some(handle.user_id) {
                continue;
            }
            handle.addr.do_send(message.clone());
            sent += 1;
        }

        tracing::debug!("Broadcast to room {}: {} sessions", conversation_id, sent);
    }

    fn user_present(&self, conversation_id: &Uuid, user_id: &Uuid) -> bool {
        self.rooms.get(conversation_id).is_some_and(|room| {
            room.iter()
                .filter_map(|sid| self.sessions.get(sid))
                .any(|handle| handle.user_id == *user_id)
        })
    }
}

impl Actor for ChatServer {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Chat server started");
    }
}

impl Handler<Connect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        let first_session = !self.user_present(&msg.conversation_id, &msg.user_id);

        self.sessions.insert(
            msg.session_id,
            SessionHandle {
                user_id: msg.user_id,
                conversation_id: msg.conversation_id,
                addr: msg.addr,
            },
        );
        self.rooms.entry(msg.conversation_id).or_default().insert(msg.session_id);

        tracing::info!(
            "User {} connected to conversation {} (session {})",
            msg.user_id,
            msg.conversation_id,
            msg.session_id
        );

        if first_session {
            self.broadcast(
                &msg.conversation_id,
                ServerMessage::UserStatusUpdate { user_id: msg.user_id, is_online: true },
                Some(msg.user_id),
            );
        }
    }
}

impl Handler<Disconnect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        let Some(handle) = self.sessions.remove(&msg.session_id) else { return };

        if let Some(room) = self.rooms.get_mut(&handle.conversation_id) {
            room.remove(&msg.session_id);
            if room.is_empty() {
                self.rooms.remove(&handle.conversation_id);
            }
        }

        tracing::info!(
            "Session {} of user {} left conversation {}",
            msg.session_id,
            handle.user_id,
            handle.conversation_id
        );

        if !self.user_present(&handle.conversation_id, &handle.user_id) {
            self.broadcast(
                &handle.conversation_id,
                ServerMessage::UserStatusUpdate { user_id: handle.user_id, is_online: false },
                Some(handle.user_id),
            );
        }
    }
}

impl Handler<BroadcastToRoom> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: BroadcastToRoom, _: &mut Context<Self>) {
        self.broadcast(&msg.conversation_id, msg.message, msg.skip_user_id);
    }
}

impl Handler<GetOnlineUsers> for ChatServer {
    type Result = Vec<Uuid>;

    fn handle(&mut self, msg: GetOnlineUsers, _: &mut Context<Self>) -> Self::Result {
        let Some(room) = self.rooms.get(&msg.conversation_id) else { return Vec::new() };

        let users: HashSet<Uuid> = room
            .iter()
            .filter_map(|sid| self.sessions.get(sid))
            .map(|handle| handle.user_id)
            .collect();
        users.into_iter().collect()
    }
}

impl Handler<CountUserSessions> for ChatServer {
    type Result = usize;

    fn handle(&mut self, msg: CountUserSessions, _: &mut Context<Self>) -> Self::Result {
        self.sessions.values().filter(|handle| handle.user_id == msg.user_id).count()
    }
}

/// Lets the server push ServerMessage straight to session actors.
impl Message for ServerMessage {
    type Result = ();
}

impl Default for ChatServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn spawn_session(
        server: &Addr<ChatServer>,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> (Uuid, Addr<WebSocketSession>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::now_v7();
        let session = WebSocketSession {
            id,
            user_id,
            conversation_id,
            server: server.clone(),
            tx,
            message_service: None,
            read_service: None,
        };
        (id, session.start(), rx)
    }

    /// Request-response roundtrip drains the actor mailboxes before the
    /// channel assertions below.
    async fn flush(server: &Addr<ChatServer>, conversation_id: Uuid) {
        server.send(GetOnlineUsers { conversation_id }).await.unwrap();
    }

    #[actix_web::test]
    async fn broadcast_reaches_the_room_only() {
        let server = ChatServer::new().start();
        let (room_a, room_b) = (Uuid::now_v7(), Uuid::now_v7());
        let (alice, bob, carol) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());

        let (_, addr_a, mut rx_a) = spawn_session(&server, alice, room_a);
        let (_, addr_b, mut rx_b) = spawn_session(&server, bob, room_a);
        let (_, addr_c, mut rx_c) = spawn_session(&server, carol, room_b);

        // Sessions register with the server in started(); flush the pipeline.
        flush(&server, room_a).await;
        addr_a.send(ServerMessage::Pong).await.unwrap();
        addr_b.send(ServerMessage::Pong).await.unwrap();
        addr_c.send(ServerMessage::Pong).await.unwrap();
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}
        while rx_c.try_recv().is_ok() {}

        server.do_send(BroadcastToRoom {
            conversation_id: room_a,
            message: ServerMessage::UserTyping { user_id: alice, is_typing: true },
            skip_user_id: Some(alice),
        });

        flush(&server, room_a).await;
        addr_a.send(ServerMessage::Pong).await.unwrap();
        addr_b.send(ServerMessage::Pong).await.unwrap();
        addr_c.send(ServerMessage::Pong).await.unwrap();

        // Skipped author, other room untouched, room member got the event.
        let received = rx_b.try_recv().unwrap();
        assert!(received.contains("user_typing"));
        assert!(rx_a.try_recv().unwrap().contains("pong"));
        assert!(rx_c.try_recv().unwrap().contains("pong"));
    }

    #[actix_web::test]
    async fn online_users_are_deduplicated_per_room() {
        let server = ChatServer::new().start();
        let room = Uuid::now_v7();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();

        // Alice holds two sessions in the room.
        let (_, _a1, _rx1) = spawn_session(&server, alice, room);
        let (_, _a2, _rx2) = spawn_session(&server, alice, room);
        let (_, _b, _rx3) = spawn_session(&server, bob, room);
        flush(&server, room).await;

        let mut online = server.send(GetOnlineUsers { conversation_id: room }).await.unwrap();
        online.sort();
        let mut expected = vec![alice, bob];
        expected.sort();
        assert_eq!(online, expected);
    }

    #[actix_web::test]
    async fn teardown_disconnect_deregisters_the_session() {
        let server = ChatServer::new().start();
        let room = Uuid::now_v7();
        let alice = Uuid::now_v7();

        let (session_id, addr, rx) = spawn_session(&server, alice, room);
        flush(&server, room).await;
        assert_eq!(server.send(GetOnlineUsers { conversation_id: room }).await.unwrap(), vec![
            alice
        ]);

        // The bridge task drops its handles when the socket closes; without
        // the explicit Disconnect the server would keep the session forever.
        drop(addr);
        drop(rx);
        server.do_send(Disconnect { session_id });
        flush(&server, room).await;

        assert!(server.send(GetOnlineUsers { conversation_id: room }).await.unwrap().is_empty());
        assert_eq!(server.send(CountUserSessions { user_id: alice }).await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn session_count_tracks_each_device() {
        let server = ChatServer::new().start();
        let (room_a, room_b) = (Uuid::now_v7(), Uuid::now_v7());
        let alice = Uuid::now_v7();

        // Two devices in different rooms.
        let (first, _a1, _rx1) = spawn_session(&server, alice, room_a);
        let (second, _a2, _rx2) = spawn_session(&server, alice, room_b);
        flush(&server, room_a).await;

        assert_eq!(server.send(CountUserSessions { user_id: alice }).await.unwrap(), 2);

        // Closing one device must not look like the user went offline.
        server.do_send(Disconnect { session_id: first });
        flush(&server, room_a).await;
        assert_eq!(server.send(CountUserSessions { user_id: alice }).await.unwrap(), 1);

        server.do_send(Disconnect { session_id: second });
        flush(&server, room_b).await;
        assert_eq!(server.send(CountUserSessions { user_id: alice }).await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn presence_updates_on_connect_and_disconnect() {
        let server = ChatServer::new().start();
        let room = Uuid::now_v7();
        let (alice, bob) = (Uuid::now_v7(), Uuid::now_v7());

        let (_, addr_a, mut rx_a) = spawn_session(&server, alice, room);
        flush(&server, room).await;

        let (bob_session, _addr_b, _rx_b) = spawn_session(&server, bob, room);
        flush(&server, room).await;
        addr_a.send(ServerMessage::Pong).await.unwrap();

        let received = rx_a.try_recv().unwrap();
        assert!(received.contains("user_status_update"));
        assert!(received.contains("\"is_online\":true"));

        server.do_send(Disconnect { session_id: bob_session });
        flush(&server, room).await;
        addr_a.send(ServerMessage::Pong).await.unwrap();

        let mut saw_offline = false;
        while let Ok(received) = rx_a.try_recv() {
            if received.contains("\"is_online\":false") {
                saw_offline = true;
            }
        }
        assert!(saw_offline);
    }
}
