use actix_web::{get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::conversation::repository_pg::{ConversationPgRepository, ParticipantPgRepository},
    modules::message::repository_pg::MessagePgRepository,
    modules::read_tracking::{
        model::{MarkReadResponse, UnreadCountResponse},
        repository_pg::ReadReceiptPgRepository,
        schema::ReadReceiptEntity,
        service::ReadTrackingService,
    },
};

pub type ReadSvc = ReadTrackingService<
    ConversationPgRepository,
    ParticipantPgRepository,
    MessagePgRepository,
    ReadReceiptPgRepository,
>;

#[post("/messages/{message_id}/read")]
pub async fn mark_message_read(
    service: web::Data<ReadSvc>,
    message_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    service.mark_message_read(*message_id, user_id).await?;

    Ok(success::Success::ok(None).message("Message marked as read"))
}

#[post("/conversations/{conversation_id}/read")]
pub async fn mark_conversation_read(
    service: web::Data<ReadSvc>,
    conversation_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<MarkReadResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let marked = service.mark_conversation_read(*conversation_id, user_id).await?;

    Ok(success::Success::ok(Some(MarkReadResponse { marked })))
}

#[get("/messages/{message_id}/readers")]
pub async fn message_readers(
    service: web::Data<ReadSvc>,
    message_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ReadReceiptEntity>>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let readers = service.message_readers(*message_id, user_id).await?;

    Ok(success::Success::ok(Some(readers)))
}

#[get("/conversations/{conversation_id}/unread_count")]
pub async fn unread_count(
    service: web::Data<ReadSvc>,
    conversation_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<UnreadCountResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let unread_count = service.unread_count(*conversation_id, user_id).await?;

    Ok(success::Success::ok(Some(UnreadCountResponse { unread_count })))
}
