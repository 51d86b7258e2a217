use actix_web::{
    middleware::from_fn,
    web::{scope, ServiceConfig},
};

use crate::middlewares::rate_limit::message_rate_limit;
use crate::modules::message::handle::*;

/// Registered before the conversation routes so the longer
/// `/conversations/{id}/messages` prefix is tried first.
pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/conversations/{conversation_id}/messages")
            .wrap(from_fn(message_rate_limit))
            .service(send_message)
            .service(get_messages),
    )
    .service(edit_message)
    .service(delete_message);
}
