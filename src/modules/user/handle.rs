use actix_web::{get, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::user::{
        model::{SearchUserQuery, SearchUserResponse, UserResponse},
        service::UserService,
    },
    utils::ValidatedQuery,
};

#[get("/search")]
pub async fn search_users(
    user_service: web::Data<UserService>,
    query: ValidatedQuery<SearchUserQuery>,
    req: HttpRequest,
) -> Result<success::Success<SearchUserResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let results = user_service.search(&query.0.q, user_id).await?;

    Ok(success::Success::ok(Some(SearchUserResponse { results })))
}

#[get("/{user_id}")]
pub async fn get_user(
    user_service: web::Data<UserService>,
    user_id: web::Path<Uuid>,
) -> Result<success::Success<UserResponse>, error::Error> {
    let user = user_service.get_by_id(*user_id).await?;

    Ok(success::Success::ok(Some(user)))
}
