use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::modules::user::schema::UserEntity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

impl From<UserEntity> for UserResponse {
    fn from(entity: UserEntity) -> Self {
        UserResponse {
            id: entity.id,
            email: entity.email,
            display_name: entity.display_name,
            avatar_url: entity.avatar_url,
            is_online: entity.is_online,
            last_seen: entity.last_seen,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchUserQuery {
    #[validate(length(max = 100))]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchUserResponse {
    pub results: Vec<UserResponse>,
}
