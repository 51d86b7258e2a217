use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::access::{AccessPolicy, Action, Resource};
use crate::modules::conversation::repository::{ConversationRepository, ParticipantRepository};
use crate::modules::message::repository::MessageRepository;
use crate::modules::read_tracking::repository::ReadReceiptRepository;
use crate::modules::read_tracking::schema::ReadReceiptEntity;

#[derive(Clone)]
pub struct ReadTrackingService<C, P, M, R>
where
    C: ConversationRepository + Send + Sync,
    P: ParticipantRepository + Send + Sync,
    M: MessageRepository + Send + Sync,
    R: ReadReceiptRepository + Send + Sync,
{
    conversation_repo: Arc<C>,
    participant_repo: Arc<P>,
    message_repo: Arc<M>,
    receipt_repo: Arc<R>,
    access: AccessPolicy<P, M>,
}

impl<C, P, M, R> ReadTrackingService<C, P, M, R>
where
    C: ConversationRepository + Send + Sync,
    P: ParticipantRepository + Send + Sync,
    M: MessageRepository + Send + Sync,
    R: ReadReceiptRepository + Send + Sync,
{
    pub fn with_dependencies(
        conversation_repo: Arc<C>,
        participant_repo: Arc<P>,
        message_repo: Arc<M>,
        receipt_repo: Arc<R>,
    ) -> Self {
        let access =
            AccessPolicy::with_dependencies(participant_repo.clone(), message_repo.clone());
        ReadTrackingService { conversation_repo, participant_repo, message_repo, receipt_repo, access }
    }

    /// Records that the user has observed one message. Safe to call twice:
    /// the receipt is get-or-create and the cursor only ever moves forward.
    /// Returns true when a new receipt was written.
    pub async fn mark_message_read(
        &self,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, error::SystemError> {
        self.access.authorize(&user_id, Resource::Message(message_id), Action::View).await?;

        let message = self
            .message_repo
            .find_by_id(&message_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        let created = self.receipt_repo.mark_read(&message_id, &user_id).await?;

        self.participant_repo
            .advance_cursor(&message.conversation_id, &user_id, &message_id)
            .await?;

        Ok(created)
    }

    /// Marks everything in the conversation up to its latest message as read.
    /// Returns the number of receipts written.
    pub async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, error::SystemError> {
        self.access
            .authorize(&user_id, Resource::Conversation(conversation_id), Action::View)
            .await?;

        let Some(latest) = self.message_repo.latest(&conversation_id).await? else {
            return Ok(0);
        };

        let written = self
            .receipt_repo
            .mark_read_up_to(&conversation_id, &user_id, latest.created_at)
            .await?;

        self.participant_repo.advance_cursor(&conversation_id, &user_id, &latest.id).await?;

        log::debug!(
            "User {} caught up in conversation {} ({} receipts)",
            user_id,
            conversation_id,
            written
        );
        Ok(written)
    }

    /// Who has seen a message, oldest receipt first. Includes the sender's
    /// own receipt.
    pub async fn message_readers(
        &self,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ReadReceiptEntity>, error::SystemError> {
        self.access.authorize(&user_id, Resource::Message(message_id), Action::View).await?;

        self.receipt_repo.readers(&message_id).await
    }

    pub async fn unread_count(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, error::SystemError> {
        self.access
            .authorize(&user_id, Resource::Conversation(conversation_id), Action::View)
            .await?;

        let conversation = self
            .conversation_repo
            .find_by_id(&conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        if conversation.last_message_id.is_none() {
            return Ok(0);
        }

        let cursor_id = self
            .participant_repo
            .find(&conversation_id, &user_id)
            .await?
            .and_then(|p| p.last_read_message_id);

        let after = match cursor_id {
            Some(id) => self.message_repo.find_by_id(&id).await?.map(|m| m.created_at),
            None => None,
        };

        self.message_repo.count_unread(&conversation_id, after, &user_id).await
    }
}
