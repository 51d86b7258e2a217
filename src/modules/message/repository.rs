use uuid::Uuid;

use crate::{
    api::error,
    modules::message::{model::NewMessage, schema::MessageEntity},
};

#[async_trait::async_trait]
pub trait MessageRepository {
    async fn create(&self, message: &NewMessage) -> Result<MessageEntity, error::SystemError>;

    async fn find_by_id(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    /// One page of the log, newest first, soft-deleted rows excluded. `before`
    /// is the keyset cursor over send time.
    async fn list_page(
        &self,
        conversation_id: &Uuid,
        before: Option<chrono::DateTime<chrono::Utc>>,
        limit: i64,
    ) -> Result<Vec<MessageEntity>, error::SystemError>;

    async fn latest(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    /// Replaces the content and flags the message as edited.
    async fn edit(
        &self,
        message_id: &Uuid,
        content: &str,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    async fn soft_delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError>;

    /// Messages sent strictly after `after` (all of them when `after` is
    /// None), excluding the given sender's own messages and soft-deleted rows.
    async fn count_unread(
        &self,
        conversation_id: &Uuid,
        after: Option<chrono::DateTime<chrono::Utc>>,
        exclude_sender: &Uuid,
    ) -> Result<i64, error::SystemError>;
}
