use uuid::Uuid;

use crate::{
    api::error,
    modules::user::{repository::UserRepository, schema::UserEntity},
};

#[derive(Clone)]
pub struct UserPgRepository {
    pool: sqlx::PgPool,
}

impl UserPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for UserPgRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<UserEntity>, error::SystemError> {
        let user = sqlx::query_as::<_, UserEntity>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn search(
        &self,
        query: &str,
        exclude_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<UserEntity>, error::SystemError> {
        let pattern = format!("%{}%", query);
        let users = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT *
            FROM users
            WHERE (display_name ILIKE $1 OR email ILIKE $1)
            AND id != $2
            ORDER BY display_name
            LIMIT $3
            "#,
        )
        .bind(&pattern)
        .bind(exclude_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn set_online_status(
        &self,
        id: &Uuid,
        is_online: bool,
    ) -> Result<(), error::SystemError> {
        sqlx::query(
            r#"
            UPDATE users
            SET is_online = $2,
                last_seen = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(is_online)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
