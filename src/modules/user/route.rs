use actix_web::web::{scope, ServiceConfig};

use crate::modules::user::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(scope("/users").service(search_users).service(get_user));
}
