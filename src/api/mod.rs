//! HTTP API module
//!
//! This module is the boundary with the popup shell: timer controls, the
//! snapshot/banner event stream, and access to the shell's own records.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timer", get(timer_handler))
        .route("/timer/start", post(start_handler))
        .route("/timer/reset", post(reset_handler))
        .route("/timer/settings", put(settings_handler))
        .route("/timer/events", get(events_handler))
        .route("/store/:key", get(store_get_handler).put(store_put_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
