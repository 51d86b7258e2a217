use actix_web::web::{scope, ServiceConfig};

use crate::modules::conversation::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/conversations")
            .service(create_conversation)
            .service(list_conversations)
            .service(get_conversation)
            .service(add_participant)
            .service(remove_participant),
    );
}
