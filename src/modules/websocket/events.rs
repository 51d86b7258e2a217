/// Actor messages exchanged between session actors and the chat server.
use actix::prelude::*;
use uuid::Uuid;

use super::message::ServerMessage;
use super::session::WebSocketSession;

/// A session opened a connection to a conversation room.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub conversation_id: Uuid,
    pub addr: Addr<WebSocketSession>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub session_id: Uuid,
}

/// Fan a message out to every session in the room, optionally skipping one
/// user (typing indicators are not echoed back to their author).
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct BroadcastToRoom {
    pub conversation_id: Uuid,
    pub message: ServerMessage,
    pub skip_user_id: Option<Uuid>,
}

/// Users with at least one live session in the room.
#[derive(Message)]
#[rtype(result = "Vec<Uuid>")]
pub struct GetOnlineUsers {
    pub conversation_id: Uuid,
}

/// Live sessions a user holds across all rooms. The connection teardown in
/// handler.rs only persists `is_online = false` when this drops to zero.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CountUserSessions {
    pub user_id: Uuid,
}
