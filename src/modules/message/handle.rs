use actix_web::{delete, get, patch, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::conversation::repository_pg::{ConversationPgRepository, ParticipantPgRepository},
    modules::message::{
        model::{EditMessage, GetMessageResponse, MessageQueryRequest, MessageResponse, SendMessage},
        repository_pg::MessagePgRepository,
        service::MessageService,
    },
    modules::read_tracking::repository_pg::ReadReceiptPgRepository,
    utils::{ValidatedJson, ValidatedQuery},
};

pub type MessageSvc = MessageService<
    ConversationPgRepository,
    ParticipantPgRepository,
    MessagePgRepository,
    ReadReceiptPgRepository,
>;

#[post("")]
pub async fn send_message(
    service: web::Data<MessageSvc>,
    conversation_id: web::Path<Uuid>,
    payload: ValidatedJson<SendMessage>,
    req: HttpRequest,
) -> Result<success::Success<MessageResponse>, error::Error> {
    let sender_id = get_claims(&req)?.sub;

    let message = service.send_message(*conversation_id, sender_id, payload.0).await?;

    Ok(success::Success::created(Some(message)))
}

#[get("")]
pub async fn get_messages(
    service: web::Data<MessageSvc>,
    conversation_id: web::Path<Uuid>,
    query: ValidatedQuery<MessageQueryRequest>,
    req: HttpRequest,
) -> Result<success::Success<GetMessageResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let MessageQueryRequest { limit, cursor } = query.0;

    let page = service.get_messages(*conversation_id, user_id, limit, cursor).await?;

    Ok(success::Success::ok(Some(page)))
}

#[patch("/messages/{message_id}")]
pub async fn edit_message(
    service: web::Data<MessageSvc>,
    message_id: web::Path<Uuid>,
    payload: ValidatedJson<EditMessage>,
    req: HttpRequest,
) -> Result<success::Success<MessageResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let message = service.edit_message(*message_id, user_id, payload.0.content).await?;

    Ok(success::Success::ok(Some(message)))
}

#[delete("/messages/{message_id}")]
pub async fn delete_message(
    service: web::Data<MessageSvc>,
    message_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    service.delete_message(*message_id, user_id).await?;

    Ok(success::Success::no_content())
}
