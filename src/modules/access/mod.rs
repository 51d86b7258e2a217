/// Polymorphic authorization over the closed set of guarded resources.
///
/// Every conversation and message operation funnels through `AccessPolicy`
/// instead of inspecting object types at the call sites: a resource variant
/// names what is being touched, an action names how.
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::repository::ParticipantRepository;
use crate::modules::message::repository::MessageRepository;

#[derive(Debug, Clone, Copy)]
pub enum Resource {
    Conversation(Uuid),
    Message(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    View,
    Modify,
}

#[derive(Clone)]
pub struct AccessPolicy<P, M>
where
    P: ParticipantRepository + Send + Sync,
    M: MessageRepository + Send + Sync,
{
    participant_repo: Arc<P>,
    message_repo: Arc<M>,
}

impl<P, M> AccessPolicy<P, M>
where
    P: ParticipantRepository + Send + Sync,
    M: MessageRepository + Send + Sync,
{
    pub fn with_dependencies(participant_repo: Arc<P>, message_repo: Arc<M>) -> Self {
        AccessPolicy { participant_repo, message_repo }
    }

    /// Participant status gates every action; modifying a message additionally
    /// requires ownership.
    pub async fn authorize(
        &self,
        user_id: &Uuid,
        resource: Resource,
        action: Action,
    ) -> Result<(), error::SystemError> {
        let conversation_id = match resource {
            Resource::Conversation(conversation_id) => conversation_id,
            Resource::Message(message_id) => {
                let message = self
                    .message_repo
                    .find_by_id(&message_id)
                    .await?
                    .filter(|m| m.deleted_at.is_none())
                    .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

                if action == Action::Modify && message.sender_id != *user_id {
                    return Err(error::SystemError::forbidden(
                        "Only the sender can modify a message",
                    ));
                }

                message.conversation_id
            }
        };

        if !self.participant_repo.is_participant(&conversation_id, user_id).await? {
            return Err(error::SystemError::forbidden(
                "You are not a participant of this conversation",
            ));
        }

        Ok(())
    }
}
