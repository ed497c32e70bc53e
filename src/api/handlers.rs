//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    persistence::StoreError,
    services::Banner,
    state::{AppState, TIMER_STATE_KEY},
    timer::TimerSnapshot,
};
use super::responses::{
    ErrorResponse, HealthResponse, SettingsRequest, StatusResponse, StoreItemResponse,
};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

/// Handle GET /timer - Return the current timer snapshot
pub async fn timer_handler(State(state): State<Arc<AppState>>) -> Result<Json<TimerSnapshot>, StatusCode> {
    match state.snapshot() {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            error!("Failed to read timer snapshot: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /timer/start - Start the countdown of the current phase
pub async fn start_handler(State(state): State<Arc<AppState>>) -> Result<Json<TimerSnapshot>, StatusCode> {
    match state.start_timer() {
        Ok(snapshot) => {
            info!("Start endpoint called - {} running", snapshot.phase_label);
            Ok(Json(snapshot))
        }
        Err(e) => {
            error!("Failed to start timer: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /timer/reset - Return to an idle focus phase
pub async fn reset_handler(State(state): State<Arc<AppState>>) -> Result<Json<TimerSnapshot>, StatusCode> {
    match state.reset_timer() {
        Ok(snapshot) => {
            info!("Reset endpoint called - timer idle");
            Ok(Json(snapshot))
        }
        Err(e) => {
            error!("Failed to reset timer: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle PUT /timer/settings - Change focus and break durations
pub async fn settings_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SettingsRequest>,
) -> Result<Json<TimerSnapshot>, StatusCode> {
    match state.apply_settings(request.work_minutes, request.break_minutes) {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            error!("Failed to apply timer settings: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

enum Next {
    Snapshot,
    Banner(Result<Banner, RecvError>),
    Closed,
}

/// Handle GET /timer/events - Stream snapshots and banners to the popup
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let snapshots = state.subscribe_snapshots();
    let banners = state.subscribe_banners();

    let events = stream::unfold(
        (snapshots, banners, true),
        |(mut snapshots, mut banners, first)| async move {
            if first {
                let snapshot = snapshots.borrow_and_update().clone();
                let event = Event::default().event("snapshot").json_data(&snapshot);
                return Some((event, (snapshots, banners, false)));
            }

            loop {
                let next = tokio::select! {
                    changed = snapshots.changed() => {
                        if changed.is_ok() { Next::Snapshot } else { Next::Closed }
                    }
                    banner = banners.recv() => Next::Banner(banner),
                };

                let event = match next {
                    Next::Snapshot => {
                        let snapshot = snapshots.borrow_and_update().clone();
                        Event::default().event("snapshot").json_data(&snapshot)
                    }
                    Next::Banner(Ok(banner)) => Event::default().event("banner").json_data(&banner),
                    Next::Banner(Err(RecvError::Lagged(skipped))) => {
                        warn!("Event stream lagged, {} banners skipped", skipped);
                        continue;
                    }
                    Next::Banner(Err(RecvError::Closed)) | Next::Closed => return None,
                };
                return Some((event, (snapshots, banners, false)));
            }
        },
    );

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle GET /store/:key - Read a record owned by the popup shell
pub async fn store_get_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<StoreItemResponse>, ApiError> {
    match state.store.get(&key).await {
        Ok(value) => Ok(Json(StoreItemResponse { key, value })),
        Err(e) => {
            error!("Failed to read '{}': {}", key, e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Handle PUT /store/:key - Write a record owned by the popup shell
///
/// The timer record is rejected: only the persistence gate writes it.
pub async fn store_put_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<StoreItemResponse>, ApiError> {
    if key == TIMER_STATE_KEY {
        warn!("Rejected direct write of '{}'", key);
        return Err(api_error(
            StatusCode::FORBIDDEN,
            format!("'{}' is managed by the timer", key),
        ));
    }

    match state.store.set(&key, value.clone()).await {
        Ok(()) => {
            info!("Stored shell record '{}'", key);
            Ok(Json(StoreItemResponse {
                key,
                value: Some(value),
            }))
        }
        Err(e @ StoreError::QuotaExceeded { .. }) => {
            warn!("Rejected write of '{}': {}", key, e);
            Err(api_error(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()))
        }
        Err(e) => {
            error!("Failed to write '{}': {}", key, e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Handle GET /status - Return the timer together with runtime metadata
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let timer = match state.snapshot() {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to get timer state: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer,
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
