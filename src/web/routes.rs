use actix_web::http::Method;
use actix_web::web;

use crate::web::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/tasacion", web::post().to(handlers::tasar))
            .route(
                "/tasacion",
                web::method(Method::OPTIONS).to(handlers::tasacion_preflight),
            ),
    )
    .route("/", web::get().to(handlers::index))
    .route("/health", web::get().to(handlers::health_check));
}
