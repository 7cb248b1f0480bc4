//! Route table.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the router: the listener socket, two read-only JSON views and
/// the HTML status page.
///
/// The canvas, admin and display pages may be served from another
/// origin, so CORS is open.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws/listener", get(ws::ws_listener))
        .route("/api/status", get(handlers::get_status))
        .route("/api/rounds", get(handlers::get_rounds))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
