mod errors;
mod routes_records;

pub use errors::ApiError;

use crate::config::Config;
use crate::service::QueryService;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub service: QueryService,
}

pub fn router(service: QueryService, config: &Config) -> Router {
    let cors = cors_layer(config);
    let state = AppState { service };
    let mut app = Router::new()
        .route("/upsert", post(routes_records::upsert))
        .route("/query", post(routes_records::query))
        .route("/health", get(routes_records::health))
        .route(
            "/records/{id}",
            get(routes_records::get_record).delete(routes_records::delete_record),
        )
        .route("/stats", get(routes_records::stats))
        .route("/compact", post(routes_records::compact))
        .with_state(state);
    if let Some(cors) = cors {
        app = app.layer(cors);
    }
    app
}

fn cors_layer(config: &Config) -> Option<CorsLayer> {
    let origins = config.cors_allowed_origins.as_deref()?;
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.trim() == "*" {
        return Some(layer.allow_origin(Any));
    }
    let parsed: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();
    Some(layer.allow_origin(AllowOrigin::list(parsed)))
}
