mod recommend;

use actix_web::{middleware, web, App, HttpResponse, HttpServer, Responder};
use rail_control::resolution::{validate_payload, DecisionResponse};
use serde_json::{json, Value};
use std::env;

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "OK" }))
}

async fn ai_suggest(payload: web::Json<Value>) -> HttpResponse {
    match validate_payload(payload.into_inner()) {
        Ok(request) => {
            log::info!(
                "Decision request for {} vs {}",
                request.priority_train,
                request.affected_train
            );
            HttpResponse::Ok().json(recommend::recommend(&request))
        }
        Err(err) => {
            log::warn!("Rejected decision request: {err}");
            HttpResponse::BadRequest().json(DecisionResponse::failure(err.to_string()))
        }
    }
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/ai-suggest", web::post().to(ai_suggest));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(5000);

    log::info!("Starting decision gateway on 0.0.0.0:{port}");

    HttpServer::new(|| {
        App::new()
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
