use serde::Serialize;
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Receipt row recording that a user has observed a message. The
/// (message, user) pair is unique.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReadReceiptEntity {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub read_at: chrono::DateTime<chrono::Utc>,
}
