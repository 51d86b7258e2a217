use actix_web::web::ServiceConfig;

use crate::modules::read_tracking::handle::*;

/// Exact-path resources, registered ahead of the conversation scope so
/// `/conversations/{id}/read` and friends are matched here first.
pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(mark_message_read)
        .service(message_readers)
        .service(mark_conversation_read)
        .service(unread_count);
}
