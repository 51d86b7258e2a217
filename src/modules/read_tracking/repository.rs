use uuid::Uuid;

use crate::{api::error, modules::read_tracking::schema::ReadReceiptEntity};

#[async_trait::async_trait]
pub trait ReadReceiptRepository {
    /// Get-or-create on the unique (message, user) pair. Returns true when a
    /// new receipt row was written, false when one already existed; concurrent
    /// calls for the same pair never produce duplicates.
    async fn mark_read(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError>;

    /// Creates receipts for every message in the conversation sent at or
    /// before `up_to` that the user has not authored and not yet observed.
    /// Returns the number of receipts written.
    async fn mark_read_up_to(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        up_to: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, error::SystemError>;

    async fn readers(
        &self,
        message_id: &Uuid,
    ) -> Result<Vec<ReadReceiptEntity>, error::SystemError>;
}
