//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application:
//! the WebSocket relay endpoint and the static browser client.

use crate::{state::AppState, ws::ws_handler};

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let static_dir = app_state.config.static_dir.clone();

    // Group all routes that require AppState into their own router.
    let ws_router = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    // Static routes are stateless and merged alongside the relay.
    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .merge(ws_router)
}
