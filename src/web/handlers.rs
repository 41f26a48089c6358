use actix_web::http::header;
use actix_web::{web, HttpResponse, HttpResponseBuilder, Responder};
use log::{error, info};
use serde_json::json;
use tera::Context;

use crate::tasacion::{extract, prompt};
use crate::web::models::{TasacionRequest, TasacionResponse};
use crate::AppState;

// Index page handler
pub async fn index(data: web::Data<AppState>) -> impl Responder {
    let context = Context::new();
    match data.tera.render("index.html", &context) {
        Ok(html) => HttpResponse::Ok().content_type("text/html").body(html),
        Err(e) => {
            error!("Template error: {}", e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

fn with_cors<'a>(
    builder: &'a mut HttpResponseBuilder,
    origin: &str,
) -> &'a mut HttpResponseBuilder {
    builder
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
}

// CORS preflight for the valuation endpoint
pub async fn tasacion_preflight(data: web::Data<AppState>) -> impl Responder {
    with_cors(&mut HttpResponse::NoContent(), &data.allowed_origin).finish()
}

// Valuation API endpoint. Every failure surfaces as the uniform
// {success:false, error:"SERVER_ERROR", message} envelope; a missing
// structured valuation is NOT a failure.
pub async fn tasar(data: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    match run_tasacion(&data, &body).await {
        Ok(response) => with_cors(&mut HttpResponse::Ok(), &data.allowed_origin).json(response),
        Err(e) => {
            error!("Tasación failed: {}", e);
            with_cors(&mut HttpResponse::InternalServerError(), &data.allowed_origin).json(json!({
                "success": false,
                "error": "SERVER_ERROR",
                "message": e.to_string(),
            }))
        }
    }
}

async fn run_tasacion(state: &AppState, body: &[u8]) -> anyhow::Result<TasacionResponse> {
    let request: TasacionRequest = if body.is_empty() {
        TasacionRequest::default()
    } else {
        serde_json::from_slice(body)?
    };

    info!(
        "Tasación request: {} {} ({} history messages)",
        request.datos.marca,
        request.datos.modelo,
        request.chat_history.len()
    );

    let messages = prompt::build_messages(&request.datos, &request.chat_history);
    let raw = state
        .openai
        .complete(&messages, Some(prompt::tools()), Some(prompt::tool_choice()))
        .await?;

    let valuation = extract::extract(&raw);
    if valuation.is_none() {
        info!("No structured valuation recovered from the response");
    }

    Ok(TasacionResponse {
        success: true,
        response_text: raw.content,
        valuation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::{OpenAiClient, OpenAiConfig};
    use crate::web::routes;
    use actix_web::http::{Method, StatusCode};
    use actix_web::{test, App};
    use serde_json::Value;
    use tera::Tera;

    fn test_state() -> web::Data<AppState> {
        web::Data::new(AppState {
            tera: Tera::default(),
            openai: OpenAiClient::new(OpenAiConfig::default()).unwrap(),
            allowed_origin: "https://motos.example".to_string(),
        })
    }

    #[actix_web::test]
    async fn preflight_returns_204_with_cors_headers() {
        let app = test::init_service(
            App::new()
                .app_data(test_state())
                .configure(routes::configure),
        )
        .await;
        let req = test::TestRequest::with_uri("/api/tasacion")
            .method(Method::OPTIONS)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let headers = resp.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://motos.example"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "POST, OPTIONS"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "Content-Type"
        );
    }

    #[actix_web::test]
    async fn missing_credential_yields_server_error_envelope() {
        let app = test::init_service(
            App::new()
                .app_data(test_state())
                .configure(routes::configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/tasacion")
            .set_json(json!({
                "marca": "Honda", "modelo": "PCX125", "version": "Base",
                "ano": 2019, "kms": 18000
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("SERVER_ERROR"));
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("OPENAI_API_KEY"));
    }

    #[actix_web::test]
    async fn malformed_body_yields_server_error_envelope() {
        let app = test::init_service(
            App::new()
                .app_data(test_state())
                .configure(routes::configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/tasacion")
            .insert_header(header::ContentType::json())
            .set_payload("{esto no es json")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("SERVER_ERROR"));
    }

    #[actix_web::test]
    async fn health_endpoint_responds() {
        let app = test::init_service(
            App::new()
                .app_data(test_state())
                .configure(routes::configure),
        )
        .await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
