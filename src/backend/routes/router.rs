/**
 * Router Configuration
 *
 * Combines the API routes and the WebSocket endpoint into one router.
 *
 * # Route Order
 *
 * 1. `/api/v1/...` - REST API (see `api_routes`)
 * 2. `/ws` - WebSocket push channel
 * 3. `/health` - liveness check
 * 4. Fallback - `route not found` error body
 *
 * Tracing and CORS layers wrap everything.
 */

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::error::BackendError;
use crate::backend::realtime::ws_handler;
use crate::backend::routes::api_routes::api_routes;
use crate::backend::server::state::AppState;

pub const API_PREFIX: &str = "/api/v1";

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest(API_PREFIX, api_routes(&app_state))
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "OK" }))
        .fallback(|| async { BackendError::not_found("route") })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
