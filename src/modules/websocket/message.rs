/// Wire protocol between client and server. Envelopes are JSON objects
/// discriminated by a snake_case `type` field. The conversation is implied by
/// the connection, so inbound envelopes never carry a conversation id.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::message::model::MessageResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Append a message to the conversation of this connection.
    SendMessage { content: String, reply_to: Option<Uuid> },

    /// Acknowledge a single message as read.
    MarkAsRead { message_id: Uuid },

    /// The user started composing.
    Typing,

    /// The user stopped composing.
    StopTyping,

    /// Application-level keepalive.
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A message was appended to the conversation.
    NewMessage { message: MessageResponse },

    /// A participant acknowledged a message.
    MessageRead { message_id: Uuid, user_id: Uuid },

    /// A message's content was replaced by its sender.
    MessageEdited { message: MessageResponse },

    /// A message was removed from the conversation.
    MessageDeleted { message_id: Uuid, conversation_id: Uuid },

    /// A participant started or stopped composing.
    UserTyping { user_id: Uuid, is_typing: bool },

    /// A participant's presence changed.
    UserStatusUpdate { user_id: Uuid, is_online: bool },

    /// Pong response for Ping.
    Pong,

    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::message::schema::MessageType;

    #[test]
    fn test_client_send_message_deserialize() {
        let json = r#"{"type":"send_message","content":"hello there"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::SendMessage { content, reply_to } => {
                assert_eq!(content, "hello there");
                assert!(reply_to.is_none());
            }
            _ => panic!("Expected SendMessage variant"),
        }
    }

    #[test]
    fn test_client_send_message_with_reply_deserialize() {
        let id = Uuid::now_v7();
        let json = format!(r#"{{"type":"send_message","content":"re","reply_to":"{}"}}"#, id);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(msg, ClientMessage::SendMessage { reply_to: Some(r), .. } if r == id));
    }

    #[test]
    fn test_client_mark_as_read_deserialize() {
        let id = Uuid::now_v7();
        let json = format!(r#"{{"type":"mark_as_read","message_id":"{}"}}"#, id);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(msg, ClientMessage::MarkAsRead { message_id } if message_id == id));
    }

    #[test]
    fn test_client_typing_deserialize() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"typing"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Typing));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"stop_typing"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::StopTyping));
    }

    #[test]
    fn test_client_ping_deserialize() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_invalid_type_returns_error() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn test_missing_required_field_returns_error() {
        // send_message without content
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"send_message"}"#).is_err());
    }

    #[test]
    fn test_server_new_message_serialize() {
        let message = MessageResponse {
            id: Uuid::now_v7(),
            conversation_id: Uuid::now_v7(),
            sender_id: Uuid::now_v7(),
            reply_to_id: None,
            _type: MessageType::Text,
            content: Some("Hello".to_string()),
            file_url: None,
            is_edited: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&ServerMessage::NewMessage { message }).unwrap();
        assert!(json.contains("\"type\":\"new_message\""));
        assert!(json.contains("\"content\":\"Hello\""));
    }

    #[test]
    fn test_server_message_read_serialize() {
        let (mid, uid) = (Uuid::now_v7(), Uuid::now_v7());
        let json = serde_json::to_string(&ServerMessage::MessageRead {
            message_id: mid,
            user_id: uid,
        })
        .unwrap();
        assert!(json.contains("\"type\":\"message_read\""));
        assert!(json.contains(&mid.to_string()));
        assert!(json.contains(&uid.to_string()));
    }

    #[test]
    fn test_server_message_edited_serialize() {
        let message = MessageResponse {
            id: Uuid::now_v7(),
            conversation_id: Uuid::now_v7(),
            sender_id: Uuid::now_v7(),
            reply_to_id: None,
            _type: MessageType::Text,
            content: Some("Hello again".to_string()),
            file_url: None,
            is_edited: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&ServerMessage::MessageEdited { message }).unwrap();
        assert!(json.contains("\"type\":\"message_edited\""));
        assert!(json.contains("\"is_edited\":true"));
    }

    #[test]
    fn test_server_message_deleted_serialize() {
        let (mid, cid) = (Uuid::now_v7(), Uuid::now_v7());
        let json = serde_json::to_string(&ServerMessage::MessageDeleted {
            message_id: mid,
            conversation_id: cid,
        })
        .unwrap();
        assert!(json.contains("\"type\":\"message_deleted\""));
        assert!(json.contains(&mid.to_string()));
        assert!(json.contains(&cid.to_string()));
    }

    #[test]
    fn test_server_user_typing_serialize() {
        let uid = Uuid::now_v7();
        let json =
            serde_json::to_string(&ServerMessage::UserTyping { user_id: uid, is_typing: true })
                .unwrap();
        assert!(json.contains("\"type\":\"user_typing\""));
        assert!(json.contains("\"is_typing\":true"));
    }

    #[test]
    fn test_server_user_status_update_serialize() {
        let uid = Uuid::now_v7();
        let json = serde_json::to_string(&ServerMessage::UserStatusUpdate {
            user_id: uid,
            is_online: false,
        })
        .unwrap();
        assert!(json.contains("\"type\":\"user_status_update\""));
        assert!(json.contains("\"is_online\":false"));
    }

    #[test]
    fn test_server_pong_serialize() {
        let json = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_server_error_serialize() {
        let json = serde_json::to_string(&ServerMessage::Error {
            message: "something broke".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("something broke"));
    }
}
