use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::model::ParticipantDetail;
use crate::modules::conversation::repository::{ConversationRepository, ParticipantRepository};
use crate::modules::conversation::schema::{
    ConversationEntity, ConversationType, ParticipantEntity,
};

/// Order-independent key identifying the direct conversation of a user pair.
pub fn direct_key(user_a: &Uuid, user_b: &Uuid) -> String {
    let (lo, hi) = if user_a <= user_b { (user_a, user_b) } else { (user_b, user_a) };
    format!("{lo}:{hi}")
}

#[derive(Clone)]
pub struct ConversationPgRepository {
    pool: sqlx::PgPool,
}

impl ConversationPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for ConversationPgRepository {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        let conversation =
            sqlx::query_as::<_, ConversationEntity>("SELECT * FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(conversation)
    }

    async fn create_direct(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<ConversationEntity, error::SystemError> {
        // The unique direct_key (sorted pair) makes concurrent creates for
        // the same pair collapse onto one row instead of racing.
        let direct_key = direct_key(user_a, user_b);

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, ConversationEntity>(
            r#"
            INSERT INTO conversations (id, type, created_by, direct_key)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (direct_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(ConversationType::Direct)
        .bind(user_a)
        .bind(&direct_key)
        .fetch_optional(tx.as_mut())
        .await?;

        let Some(conversation) = inserted else {
            tx.rollback().await?;
            let existing = sqlx::query_as::<_, ConversationEntity>(
                "SELECT * FROM conversations WHERE direct_key = $1",
            )
            .bind(&direct_key)
            .fetch_one(&self.pool)
            .await?;
            return Ok(existing);
        };

        sqlx::query(
            r#"
            INSERT INTO participants (conversation_id, user_id, is_admin)
            VALUES ($1, $2, false), ($1, $3, false)
            "#,
        )
        .bind(conversation.id)
        .bind(user_a)
        .bind(user_b)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(conversation)
    }

    async fn create_group(
        &self,
        name: Option<&str>,
        creator: &Uuid,
        member_ids: &[Uuid],
    ) -> Result<ConversationEntity, error::SystemError> {
        let mut tx = self.pool.begin().await?;

        let id = Uuid::now_v7();
        let conversation = sqlx::query_as::<_, ConversationEntity>(
            r#"
            INSERT INTO conversations (id, type, name, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(ConversationType::Group)
        .bind(name)
        .bind(creator)
        .fetch_one(tx.as_mut())
        .await?;

        sqlx::query(
            r#"
            INSERT INTO participants (conversation_id, user_id, is_admin)
            VALUES ($1, $2, true)
            "#,
        )
        .bind(conversation.id)
        .bind(creator)
        .execute(tx.as_mut())
        .await?;

        sqlx::query(
            r#"
            INSERT INTO participants (conversation_id, user_id, is_admin)
            SELECT $1, unnest($2::uuid[]), false
            ON CONFLICT (conversation_id, user_id) DO NOTHING
            "#,
        )
        .bind(conversation.id)
        .bind(member_ids)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(conversation)
    }

    async fn find_direct_between(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        let conversation = sqlx::query_as::<_, ConversationEntity>(
            r#"
            SELECT c.*
            FROM conversations c
            WHERE c.type = 'direct'
            AND EXISTS (
                SELECT 1
                FROM participants p1
                WHERE p1.conversation_id = c.id
                AND p1.user_id = $1
            )
            AND EXISTS (
                SELECT 1
                FROM participants p2
                WHERE p2.conversation_id = c.id
                AND p2.user_id = $2
            )
            LIMIT 1
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn list_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationEntity>, error::SystemError> {
        let conversations = sqlx::query_as::<_, ConversationEntity>(
            r#"
            SELECT c.*
            FROM conversations c
            JOIN participants p
                ON p.conversation_id = c.id
            AND p.user_id = $1
            ORDER BY c.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }

    async fn set_last_message(
        &self,
        conversation_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<(), error::SystemError> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_id = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct ParticipantPgRepository {
    pool: sqlx::PgPool,
}

impl ParticipantPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ParticipantRepository for ParticipantPgRepository {
    async fn add(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        is_admin: bool,
    ) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            r#"
            INSERT INTO participants (conversation_id, user_id, is_admin)
            VALUES ($1, $2, $3)
            ON CONFLICT (conversation_id, user_id) DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(is_admin)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            r#"
            DELETE FROM participants
            WHERE conversation_id = $1
            AND user_id = $2
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<ParticipantEntity>, error::SystemError> {
        let participant = sqlx::query_as::<_, ParticipantEntity>(
            r#"
            SELECT *
            FROM participants
            WHERE conversation_id = $1
            AND user_id = $2
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(participant)
    }

    async fn is_participant(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM participants
                WHERE conversation_id = $1
                AND user_id = $2
            )
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn list_details(
        &self,
        conversation_ids: &[Uuid],
    ) -> Result<Vec<ParticipantDetail>, error::SystemError> {
        let participants = sqlx::query_as::<_, ParticipantDetail>(
            r#"
            SELECT
                p.conversation_id,
                p.user_id,
                u.display_name,
                u.avatar_url,
                p.is_admin,
                p.last_read_message_id,
                p.joined_at
            FROM participants p
            JOIN users u ON u.id = p.user_id
            WHERE p.conversation_id = ANY($1)
            "#,
        )
        .bind(conversation_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }

    async fn advance_cursor(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        // Compares send times of the current and the new cursor message inside
        // one statement so the cursor is a monotonic read-modify-write.
        let result = sqlx::query(
            r#"
            UPDATE participants p
            SET last_read_message_id = $3
            WHERE p.conversation_id = $1
            AND p.user_id = $2
            AND (
                p.last_read_message_id IS NULL
                OR (SELECT m.created_at FROM messages m WHERE m.id = p.last_read_message_id)
                    < (SELECT m.created_at FROM messages m WHERE m.id = $3)
            )
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
