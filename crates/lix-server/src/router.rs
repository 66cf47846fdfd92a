use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use lix_protocol::endpoints;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with the sync endpoints.
pub fn build_router(state: AppState) -> Router {
    let limit = state.max_blob_size;
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::NEW, post(handler::new_handler))
        .route(endpoints::GET, post(handler::get_handler))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
