use actix::Actor;
use actix_cors::Cors;
use actix_web::{
    self, App, HttpServer,
    middleware::{Logger, from_fn},
    web,
};
use std::sync::{Arc, LazyLock};
use tracing_subscriber::EnvFilter;

use crate::{
    configs::{RedisCache, connect_database},
    middlewares::{authentication, rate_limit::{RateLimiter, RedisCounterStore}},
    modules::{
        conversation::{
            handle::ConversationSvc,
            repository_pg::{ConversationPgRepository, ParticipantPgRepository},
        },
        message::{handle::MessageSvc, repository_pg::MessagePgRepository},
        read_tracking::{handle::ReadSvc, repository_pg::ReadReceiptPgRepository},
        user::{repository_pg::UserPgRepository, service::UserService},
        websocket::{handler::websocket_handler, server::ChatServer},
    },
};

mod api;
mod configs;
mod constants;
mod middlewares;
mod modules;
mod utils;

pub static ENV: LazyLock<constants::Env> = LazyLock::new(|| {
    dotenvy::dotenv().ok();
    constants::Env::default()
});

#[actix_web::get("/")]
async fn health_check() -> &'static str {
    "Server is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db_pool =
        connect_database().await.map_err(|_| std::io::Error::other("Database connection error"))?;

    let redis_cache = Arc::new(
        RedisCache::new().await.map_err(|_| std::io::Error::other("Redis connection error"))?,
    );

    let conversation_repo = Arc::new(ConversationPgRepository::new(db_pool.clone()));
    let participant_repo = Arc::new(ParticipantPgRepository::new(db_pool.clone()));
    let message_repo = Arc::new(MessagePgRepository::new(db_pool.clone()));
    let receipt_repo = Arc::new(ReadReceiptPgRepository::new(db_pool.clone()));
    let user_repo = Arc::new(UserPgRepository::new(db_pool.clone()));

    let chat_server = ChatServer::new().start();

    let user_service = UserService::with_dependencies(user_repo, redis_cache.clone());
    let conversation_service = ConversationSvc::with_dependencies(
        conversation_repo.clone(),
        participant_repo.clone(),
        message_repo.clone(),
    );
    let message_service = MessageSvc::with_dependencies(
        conversation_repo.clone(),
        participant_repo.clone(),
        message_repo.clone(),
        receipt_repo.clone(),
        Some(chat_server.clone()),
    );
    let read_service = ReadSvc::with_dependencies(
        conversation_repo,
        participant_repo.clone(),
        message_repo,
        receipt_repo,
    );

    let rate_limiter = web::Data::new(RateLimiter::new(
        ENV.message_rate_limit,
        ENV.message_rate_window,
        Arc::new(RedisCounterStore::new(redis_cache.pool())),
    ));

    tracing::info!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(ENV.frontend_url.as_str())
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(conversation_service.clone()))
            .app_data(web::Data::new(message_service.clone()))
            .app_data(web::Data::new(read_service.clone()))
            .app_data(web::Data::new(chat_server.clone()))
            .app_data(web::Data::from(participant_repo.clone()))
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(rate_limiter.clone())
            .service(health_check)
            .route("/ws/{conversation_id}", web::get().to(websocket_handler))
            .service(
                web::scope("/api")
                    .wrap(from_fn(authentication))
                    .configure(modules::read_tracking::route::configure)
                    .configure(modules::message::route::configure)
                    .configure(modules::conversation::route::configure)
                    .configure(modules::user::route::configure),
            )
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(2)
    .run()
    .await
}
