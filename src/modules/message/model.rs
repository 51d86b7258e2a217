use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::modules::message::schema::{MessageEntity, MessageType};

pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub reply_to_id: Option<Uuid>,
    pub _type: MessageType,
    pub content: Option<String>,
    pub file_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessage {
    #[validate(length(min = 1, max = 4000))]
    pub content: String,
    pub reply_to: Option<Uuid>,
    #[serde(rename = "type")]
    pub _type: Option<MessageType>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditMessage {
    #[validate(length(min = 1, max = 4000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MessageQueryRequest {
    #[serde(default = "default_page_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i32,
    pub cursor: Option<String>,
}

fn default_page_limit() -> i32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub reply_to_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub _type: MessageType,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub is_edited: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<MessageEntity> for MessageResponse {
    fn from(entity: MessageEntity) -> Self {
        MessageResponse {
            id: entity.id,
            conversation_id: entity.conversation_id,
            sender_id: entity.sender_id,
            reply_to_id: entity.reply_to_id,
            _type: entity._type,
            content: entity.content,
            file_url: entity.file_url,
            is_edited: entity.is_edited,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetMessageResponse {
    pub messages: Vec<MessageResponse>,
    pub cursor: Option<String>,
}
