use crate::flow::Dispatcher;
use crate::models::ActionEnvelope;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

/// Inbound action surface: the transport adapter posts one envelope per
/// user action and relays the reply. No message formatting happens here.
pub async fn dispatch_action(
    dispatcher: web::Data<Dispatcher>,
    envelope: web::Json<ActionEnvelope>,
) -> Result<HttpResponse> {
    match dispatcher.handle(envelope.into_inner()).await {
        Ok(reply) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": reply
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true }))
}

pub fn action_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/actions").route("", web::post().to(dispatch_action)),
    )
    .route("/health", web::get().to(health));
}
