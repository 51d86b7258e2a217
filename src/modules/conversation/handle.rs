use actix_web::{delete, get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::conversation::{
        model::{ConversationDetail, NewConversation, ParticipantChange},
        repository_pg::{ConversationPgRepository, ParticipantPgRepository},
        service::ConversationService,
    },
    modules::message::repository_pg::MessagePgRepository,
    utils::ValidatedJson,
};

pub type ConversationSvc =
    ConversationService<ConversationPgRepository, ParticipantPgRepository, MessagePgRepository>;

#[post("")]
pub async fn create_conversation(
    service: web::Data<ConversationSvc>,
    payload: ValidatedJson<NewConversation>,
    req: HttpRequest,
) -> Result<success::Success<ConversationDetail>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let NewConversation { _type, name, member_ids } = payload.0;

    let detail = service.create_conversation(_type, name, member_ids, user_id).await?;

    Ok(success::Success::created(Some(detail)))
}

#[get("")]
pub async fn list_conversations(
    service: web::Data<ConversationSvc>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ConversationDetail>>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let conversations = service.get_by_user_id(user_id).await?;

    Ok(success::Success::ok(Some(conversations)))
}

#[get("/{conversation_id}")]
pub async fn get_conversation(
    service: web::Data<ConversationSvc>,
    conversation_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<ConversationDetail>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let detail = service.get_detail(*conversation_id, user_id).await?;

    Ok(success::Success::ok(Some(detail)))
}

#[post("/{conversation_id}/participants")]
pub async fn add_participant(
    service: web::Data<ConversationSvc>,
    conversation_id: web::Path<Uuid>,
    payload: ValidatedJson<ParticipantChange>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let actor_id = get_claims(&req)?.sub;

    service.add_participant(*conversation_id, actor_id, payload.0.user_id).await?;

    Ok(success::Success::created(None).message("Participant added"))
}

#[delete("/{conversation_id}/participants/{user_id}")]
pub async fn remove_participant(
    service: web::Data<ConversationSvc>,
    path: web::Path<(Uuid, Uuid)>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let actor_id = get_claims(&req)?.sub;
    let (conversation_id, user_id) = path.into_inner();

    service.remove_participant(conversation_id, actor_id, user_id).await?;

    Ok(success::Success::no_content())
}
