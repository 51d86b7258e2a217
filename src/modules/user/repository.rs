use uuid::Uuid;

use crate::{api::error, modules::user::schema::UserEntity};

#[async_trait::async_trait]
pub trait UserRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<UserEntity>, error::SystemError>;

    /// Case-insensitive match on display name or email, excluding `exclude_id`.
    async fn search(
        &self,
        query: &str,
        exclude_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<UserEntity>, error::SystemError>;

    /// Flips the presence flag and stamps `last_seen`.
    async fn set_online_status(
        &self,
        id: &Uuid,
        is_online: bool,
    ) -> Result<(), error::SystemError>;
}
