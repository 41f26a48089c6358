mod openai;
mod tasacion;
mod web;

use actix_files as fs;
use actix_web::{web::Data, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use std::env;
use tera::Tera;

use openai::OpenAiClient;
use web::routes;

// App state structure
struct AppState {
    tera: Tera,
    openai: OpenAiClient,
    allowed_origin: String,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting tasador de motos web application");

    let openai = match OpenAiClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize OpenAI client: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize template engine
    let mut tera = match Tera::new("templates/**/*") {
        Ok(t) => t,
        Err(e) => {
            error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
    };
    tera.autoescape_on(vec![".html"]);

    let allowed_origin = env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "*".to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    // Create app state
    let app_state = Data::new(AppState {
        tera,
        openai,
        allowed_origin,
    });

    info!("Listening on port {}", port);

    // Start web server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
            .service(fs::Files::new("/static", "./static"))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
