use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    /// Receipts written by this call; 0 when already caught up.
    pub marked: u64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}
