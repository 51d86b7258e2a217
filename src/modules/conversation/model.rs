use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::modules::conversation::schema::{ConversationEntity, ConversationType};
use crate::modules::message::model::MessageResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct NewConversation {
    #[serde(rename = "type")]
    pub _type: ConversationType,
    #[validate(length(max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ParticipantChange {
    pub user_id: Uuid,
}

/// Participant joined with user display info for conversation listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ParticipantDetail {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub last_read_message_id: Option<Uuid>,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: ConversationEntity,
    pub participants: Vec<ParticipantDetail>,
    pub last_message: Option<MessageResponse>,
    pub unread_count: i64,
}
