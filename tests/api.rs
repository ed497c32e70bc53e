//! HTTP boundary used by the popup shell

mod common;

use std::sync::Arc;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{build_state, T0};
use focus_popup::{
    create_router,
    persistence::{JsonFileStore, KeyValueStore, MemoryStore},
    state::AppState,
};

async fn mounted_router(store: Arc<dyn KeyValueStore>) -> (Router, Arc<AppState>) {
    let (state, _) = build_state(store);
    state.mount().await.unwrap();
    (create_router(Arc::clone(&state)), state)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    // Extractor rejections come back as plain text
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

#[tokio::test(start_paused = true)]
async fn health_reports_ok() {
    let (router, _) = mounted_router(Arc::new(MemoryStore::new())).await;
    let (status, body) = send(&router, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test(start_paused = true)]
async fn timer_controls_return_snapshots() {
    let (router, _) = mounted_router(Arc::new(MemoryStore::new())).await;

    let (status, body) = send(&router, "GET", "/timer", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display"], "30:00");
    assert_eq!(body["phaseLabel"], "Focus");
    assert_eq!(body["showStart"], true);

    let (status, body) = send(&router, "POST", "/timer/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isRunning"], true);
    assert_eq!(body["lastStartTimeEpochMs"], T0);
    assert_eq!(body["showStart"], false);

    let (status, body) = send(&router, "POST", "/timer/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isRunning"], false);
    assert_eq!(body["lastStartTimeEpochMs"], Value::Null);
}

#[tokio::test(start_paused = true)]
async fn settings_update_idle_countdown() {
    let (router, _) = mounted_router(Arc::new(MemoryStore::new())).await;

    let (status, body) = send(
        &router,
        "PUT",
        "/timer/settings",
        Some(json!({ "workMinutes": 25, "breakMinutes": 45 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["workDurationSeconds"], 1500);
    assert_eq!(body["breakDurationSeconds"], 1800);
    assert_eq!(body["display"], "25:00");
}

#[tokio::test(start_paused = true)]
async fn malformed_settings_are_rejected() {
    let (router, _) = mounted_router(Arc::new(MemoryStore::new())).await;
    let (status, _) = send(
        &router,
        "PUT",
        "/timer/settings",
        Some(json!({ "workMinutes": "lots" })),
    )
    .await;

    assert!(status.is_client_error());
}

#[tokio::test(start_paused = true)]
async fn shell_records_round_trip_through_store() {
    let store = Arc::new(MemoryStore::new());
    let (router, _) = mounted_router(store.clone()).await;

    let tasks = json!([{ "text": "Write report", "completed": false }]);
    let (status, _) = send(&router, "PUT", "/store/tasks", Some(tasks.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&router, "GET", "/store/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], tasks);

    let (_, body) = send(&router, "GET", "/store/theme", None).await;
    assert_eq!(body["value"], Value::Null);
}

#[tokio::test(start_paused = true)]
async fn timer_record_cannot_be_written_directly() {
    let store = Arc::new(MemoryStore::new());
    let (router, _) = mounted_router(store.clone()).await;

    let (status, body) = send(
        &router,
        "PUT",
        "/store/pomodoroState",
        Some(json!({ "isRunning": true })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "error");
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn oversized_shell_record_hits_quota() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("store.json"), 128).await.unwrap();
    let (router, _) = mounted_router(Arc::new(store)).await;

    let notes = json!(["x".repeat(500)]);
    let (status, body) = send(&router, "PUT", "/store/notes", Some(notes)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["status"], "error");
}

#[tokio::test(start_paused = true)]
async fn status_includes_last_action() {
    let (router, _) = mounted_router(Arc::new(MemoryStore::new())).await;
    send(&router, "POST", "/timer/start", None).await;

    let (status, body) = send(&router, "GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lastAction"], "start");
    assert_eq!(body["timer"]["isRunning"], true);
}

#[tokio::test(start_paused = true)]
async fn event_stream_opens_with_current_snapshot() {
    let (router, _) = mounted_router(Arc::new(MemoryStore::new())).await;

    let request = Request::builder()
        .uri("/timer/events")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut events = response.into_body().into_data_stream();
    let chunk = events.next().await.unwrap().unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(text.contains("event: snapshot"));
    assert!(text.contains("\"display\":\"30:00\""));
}
