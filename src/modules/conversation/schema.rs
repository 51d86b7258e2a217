#![allow(dead_code)]
use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, PartialEq, Clone, Type, Serialize, Deserialize)]
#[sqlx(type_name = "conversation_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Direct,
    Group,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConversationEntity {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub _type: ConversationType,
    pub name: Option<String>,
    pub created_by: Uuid,
    pub last_message_id: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ParticipantEntity {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub is_admin: bool,
    pub last_read_message_id: Option<Uuid>,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}
