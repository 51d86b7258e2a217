use uuid::Uuid;

use crate::{
    api::error,
    modules::message::{model::NewMessage, repository::MessageRepository, schema::MessageEntity},
};

#[derive(Clone)]
pub struct MessagePgRepository {
    pool: sqlx::PgPool,
}

impl MessagePgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for MessagePgRepository {
    async fn create(&self, message: &NewMessage) -> Result<MessageEntity, error::SystemError> {
        let id = Uuid::now_v7();
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, reply_to_id, type, content, file_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.reply_to_id)
        .bind(&message._type)
        .bind(&message.content)
        .bind(&message.file_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn find_by_id(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message =
            sqlx::query_as::<_, MessageEntity>("SELECT * FROM messages WHERE id = $1")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(message)
    }

    async fn list_page(
        &self,
        conversation_id: &Uuid,
        before: Option<chrono::DateTime<chrono::Utc>>,
        limit: i64,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        // has index on (conversation_id, created_at DESC) where deleted_at IS NULL
        let messages = if let Some(before) = before {
            sqlx::query_as::<_, MessageEntity>(
                r#"
                SELECT * FROM messages
                WHERE conversation_id = $1
                AND created_at < $2
                AND deleted_at IS NULL
                ORDER BY created_at DESC
                LIMIT $3
                "#,
            )
            .bind(conversation_id)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, MessageEntity>(
                r#"
                SELECT * FROM messages
                WHERE conversation_id = $1
                AND deleted_at IS NULL
                ORDER BY created_at DESC
                LIMIT $2
                "#,
            )
            .bind(conversation_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(messages)
    }

    async fn latest(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
            AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn edit(
        &self,
        message_id: &Uuid,
        content: &str,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            UPDATE messages
            SET content = $2,
                is_edited = true,
                updated_at = NOW()
            WHERE id = $1
            AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn soft_delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET deleted_at = NOW()
            WHERE id = $1
            AND deleted_at IS NULL
            "#,
        )
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_unread(
        &self,
        conversation_id: &Uuid,
        after: Option<chrono::DateTime<chrono::Utc>>,
        exclude_sender: &Uuid,
    ) -> Result<i64, error::SystemError> {
        let count: (i64,) = if let Some(after) = after {
            sqlx::query_as(
                r#"
                SELECT COUNT(*) FROM messages
                WHERE conversation_id = $1
                AND created_at > $2
                AND sender_id != $3
                AND deleted_at IS NULL
                "#,
            )
            .bind(conversation_id)
            .bind(after)
            .bind(exclude_sender)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT COUNT(*) FROM messages
                WHERE conversation_id = $1
                AND sender_id != $2
                AND deleted_at IS NULL
                "#,
            )
            .bind(conversation_id)
            .bind(exclude_sender)
            .fetch_one(&self.pool)
            .await?
        };

        Ok(count.0)
    }
}
