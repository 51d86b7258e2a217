use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::configs::RedisCache;
use crate::modules::user::model::UserResponse;
use crate::modules::user::repository::UserRepository;

const SEARCH_RESULT_LIMIT: i64 = 10;
const PROFILE_CACHE_TTL: usize = 3600;

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository + Send + Sync>,
    cache: Arc<RedisCache>,
}

impl UserService {
    pub fn with_dependencies(
        repo: Arc<dyn UserRepository + Send + Sync>,
        cache: Arc<RedisCache>,
    ) -> Self {
        info!("UserService initialized with dependencies");
        UserService { repo, cache }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<UserResponse, error::SystemError> {
        let key = format!("user:{}", id);
        if let Some(cached_user) = self.cache.get::<UserResponse>(&key).await? {
            return Ok(cached_user);
        }

        let user_entity = self.repo.find_by_id(&id).await?;
        if let Some(entity) = user_entity {
            let response = UserResponse::from(entity);
            self.cache.set(&key, &response, PROFILE_CACHE_TTL).await?;
            Ok(response)
        } else {
            Err(error::SystemError::not_found("User not found"))
        }
    }

    /// Queries shorter than 2 characters return an empty result set instead of
    /// scanning the whole table.
    pub async fn search(
        &self,
        query: &str,
        requester_id: Uuid,
    ) -> Result<Vec<UserResponse>, error::SystemError> {
        let query = query.trim();
        if query.chars().count() < 2 {
            return Ok(vec![]);
        }

        let users = self.repo.search(query, &requester_id, SEARCH_RESULT_LIMIT).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn set_online_status(
        &self,
        user_id: Uuid,
        is_online: bool,
    ) -> Result<(), error::SystemError> {
        self.repo.set_online_status(&user_id, is_online).await?;

        // Presence is part of the cached profile; drop the stale copy.
        let key = format!("user:{}", user_id);
        self.cache.delete(&key).await?;
        Ok(())
    }
}
