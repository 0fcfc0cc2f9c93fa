//! HTTP API module
//!
//! The daemon's host surface: lifecycle events in, snapshots out.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/activate", post(activate_handler))
        .route("/deactivate", post(deactivate_handler))
        .route("/start", post(start_handler))
        .route("/display/interactive", post(display_interactive_handler))
        .route("/display/idle", post(display_idle_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
