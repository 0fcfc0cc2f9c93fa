//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use tracing::{error, info, warn};

use crate::{collaborators::DisplayProbe, reconciler::DeactivateTransition, state::AppState};
use super::responses::{ApiResponse, HealthResponse, StatusResponse};

/// Handle POST /activate - Host entered the foreground
pub async fn activate_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    match state.activate() {
        Ok(activation) => {
            let message = if activation.recovered {
                "Stored timer was corrupt and has been reset".to_string()
            } else if activation.expired_while_away {
                "Timer finished while away".to_string()
            } else {
                "Foreground session started".to_string()
            };
            info!("Activate endpoint called - {}", message);
            Ok(Json(ApiResponse::ok(message, activation.snapshot)))
        }
        Err(e) => {
            error!("Failed to activate timer: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /deactivate - Host left the foreground
pub async fn deactivate_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    match state.deactivate().await {
        Ok(deactivation) => {
            let message = match deactivation.transition {
                DeactivateTransition::Abandoned => "Left early, streak reset".to_string(),
                DeactivateTransition::Checkpointed { wake_at_epoch_seconds } => {
                    format!("Timer checkpointed, wake at {}", wake_at_epoch_seconds)
                }
                DeactivateTransition::Rested => "Timer at rest".to_string(),
                DeactivateTransition::Acknowledged => "Success acknowledged".to_string(),
                DeactivateTransition::Celebrating => "Timer still succeeded".to_string(),
                DeactivateTransition::NotForeground => "Not in the foreground".to_string(),
            };

            match deactivation.warning {
                Some(warning) => {
                    warn!("Deactivated with warning: {}", warning);
                    Ok(Json(ApiResponse::warning(message, deactivation.snapshot, warning.to_string())))
                }
                None => Ok(Json(ApiResponse::ok(message, deactivation.snapshot))),
            }
        }
        Err(e) => {
            error!("Failed to deactivate timer: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /start - Begin a fresh run from a resting state
pub async fn start_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    if !state.is_foreground() {
        return Err(StatusCode::CONFLICT);
    }

    match state.start_run() {
        Ok(snapshot) => Ok(Json(ApiResponse::ok("Run started".to_string(), snapshot))),
        Err(e) => {
            error!("Failed to start timer run: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /display/interactive - Display is on and unlocked
pub async fn display_interactive_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    state.set_display_interactive(true);
    Json(ApiResponse::ok("Display marked interactive".to_string(), state.snapshot()))
}

/// Handle POST /display/idle - Display is off, locked or asleep
pub async fn display_idle_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    state.set_display_interactive(false);
    Json(ApiResponse::ok("Display marked idle".to_string(), state.snapshot()))
}

/// Handle GET /status - Return current timer status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let pending_wake_at = match state.pending_wake() {
        Ok(at) => at,
        Err(e) => {
            error!("Failed to read pending wake: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let timer = state.snapshot();
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer,
        countdown: timer.countdown_label(),
        foreground: state.is_foreground(),
        display_interactive: state.display.is_interactive(),
        timer_length_minutes: state.timer_length_minutes,
        pending_wake_at,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
