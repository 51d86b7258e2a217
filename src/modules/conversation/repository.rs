use uuid::Uuid;

use crate::{
    api::error,
    modules::conversation::{
        model::ParticipantDetail,
        schema::{ConversationEntity, ParticipantEntity},
    },
};

#[async_trait::async_trait]
pub trait ConversationRepository {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError>;

    /// Creates the conversation and both membership rows in one transaction.
    async fn create_direct(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<ConversationEntity, error::SystemError>;

    /// Creates the conversation and membership rows for the creator (admin)
    /// plus every member in one transaction.
    async fn create_group(
        &self,
        name: Option<&str>,
        creator: &Uuid,
        member_ids: &[Uuid],
    ) -> Result<ConversationEntity, error::SystemError>;

    async fn find_direct_between(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError>;

    /// Conversations the user belongs to, most recently updated first.
    async fn list_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationEntity>, error::SystemError>;

    /// Post-write hook target: refreshes the denormalized last-message pointer
    /// and the conversation timestamp.
    async fn set_last_message(
        &self,
        conversation_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<(), error::SystemError>;
}

#[async_trait::async_trait]
pub trait ParticipantRepository {
    /// Returns false when the (conversation, user) pair already exists.
    async fn add(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        is_admin: bool,
    ) -> Result<bool, error::SystemError>;

    /// Returns false when no membership row existed.
    async fn remove(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError>;

    async fn find(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<ParticipantEntity>, error::SystemError>;

    async fn is_participant(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError>;

    async fn list_details(
        &self,
        conversation_ids: &[Uuid],
    ) -> Result<Vec<ParticipantDetail>, error::SystemError>;

    /// Advances the read cursor to `message_id` only when that message is
    /// newer than the current cursor. Single conditional UPDATE, so
    /// concurrent marks cannot move the cursor backwards.
    async fn advance_cursor(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<bool, error::SystemError>;
}
