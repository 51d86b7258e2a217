use uuid::Uuid;

use crate::{
    api::error,
    modules::read_tracking::{repository::ReadReceiptRepository, schema::ReadReceiptEntity},
};

#[derive(Clone)]
pub struct ReadReceiptPgRepository {
    pool: sqlx::PgPool,
}

impl ReadReceiptPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReadReceiptRepository for ReadReceiptPgRepository {
    async fn mark_read(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_read_status (message_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_read_up_to(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        up_to: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, error::SystemError> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_read_status (message_id, user_id)
            SELECT m.id, $2
            FROM messages m
            WHERE m.conversation_id = $1
            AND m.created_at <= $3
            AND m.sender_id != $2
            AND m.deleted_at IS NULL
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(up_to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn readers(
        &self,
        message_id: &Uuid,
    ) -> Result<Vec<ReadReceiptEntity>, error::SystemError> {
        let receipts = sqlx::query_as::<_, ReadReceiptEntity>(
            r#"
            SELECT *
            FROM message_read_status
            WHERE message_id = $1
            ORDER BY read_at
            "#,
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }
}
