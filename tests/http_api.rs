//! Router-level tests driving the daemon through its HTTP surface.

use std::{sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use clap::Parser;
use serde_json::Value;
use streak_timer::{
    api::create_router,
    clock::{Clock, ManualClock},
    collaborators::{WakeScheduler, WakeToken},
    config::Config,
    reconciler::{Collaborators, TimerReconciler},
    services::SharedDisplayProbe,
    state::AppState,
    store::MemoryStore,
    tasks::{foreground_ticker_task, wake_callback_task, TokioWakeScheduler},
};
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;

const T: i64 = 1_700_000_000;

struct Daemon {
    state: Arc<AppState>,
    clock: Arc<ManualClock>,
    scheduler: Arc<TokioWakeScheduler>,
    fired_rx: UnboundedReceiver<WakeToken>,
}

fn daemon() -> Daemon {
    let config = Config::try_parse_from(["streak-timer", "--timer", "1"]).unwrap();
    let clock = Arc::new(ManualClock::new(T));
    let (scheduler, fired_rx) = TokioWakeScheduler::new(clock.clone() as Arc<dyn Clock>);
    let scheduler = Arc::new(scheduler);
    let display = Arc::new(SharedDisplayProbe::default());

    let reconciler = TimerReconciler::new(Collaborators {
        clock: clock.clone(),
        store: Arc::new(MemoryStore::new()),
        scheduler: scheduler.clone(),
        display: display.clone(),
        settings: Arc::new(config.clone()),
    });
    Daemon {
        state: Arc::new(AppState::new(&config, reconciler, display)),
        clock,
        scheduler,
        fired_rx,
    }
}

fn app_state() -> Arc<AppState> {
    daemon().state
}

async fn call(state: &Arc<AppState>, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = create_router(Arc::clone(state))
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn health_reports_ok() {
    let state = app_state();
    let (status, body) = call(&state, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn activate_starts_a_run() {
    let state = app_state();
    let (status, body) = call(&state, "POST", "/activate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["state"], "running");
    assert_eq!(body["timer"]["seconds_remaining"], 60);
    assert!(state.is_foreground());
}

#[tokio::test]
async fn sleeping_display_checkpoints_and_reports_pending_wake() {
    let state = app_state();
    call(&state, "POST", "/activate").await;
    call(&state, "POST", "/display/idle").await;

    let (status, body) = call(&state, "POST", "/deactivate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["timer"]["state"], "running");

    let (_, status_body) = call(&state, "GET", "/status").await;
    assert_eq!(status_body["foreground"], false);
    assert_eq!(status_body["display_interactive"], false);
    assert_eq!(status_body["pending_wake_at"], T + 60);
    assert_eq!(status_body["countdown"], "1:00");
}

#[tokio::test]
async fn leaving_with_display_on_resets_the_run() {
    let state = app_state();
    call(&state, "POST", "/activate").await;

    let (status, body) = call(&state, "POST", "/deactivate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["state"], "done");
    assert_eq!(body["timer"]["streak"], 0);

    let (_, status_body) = call(&state, "GET", "/status").await;
    assert_eq!(status_body["pending_wake_at"], Value::Null);
    assert_eq!(status_body["last_action"], "deactivate");
}

#[tokio::test]
async fn ticker_counts_down_only_while_foregrounded() {
    let state = app_state();
    tokio::spawn(foreground_ticker_task(Arc::clone(&state)));

    call(&state, "POST", "/activate").await;
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(state.snapshot().seconds_remaining, 59);

    call(&state, "POST", "/display/idle").await;
    call(&state, "POST", "/deactivate").await;
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(state.snapshot().seconds_remaining, 59);
}

#[tokio::test]
async fn start_requires_the_foreground() {
    let state = app_state();
    let (status, _) = call(&state, "POST", "/start").await;
    assert_eq!(status, StatusCode::CONFLICT);

    call(&state, "POST", "/activate").await;
    let (status, body) = call(&state, "POST", "/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["state"], "running");
}

#[tokio::test]
async fn reactivating_keeps_foreground_countdown() {
    let state = app_state();
    tokio::spawn(foreground_ticker_task(Arc::clone(&state)));

    call(&state, "POST", "/activate").await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(state.snapshot().seconds_remaining, 58);

    let (status, body) = call(&state, "POST", "/activate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["seconds_remaining"], 58);
}

#[tokio::test]
async fn wake_callback_completes_run_while_away() {
    let Daemon {
        state,
        clock,
        scheduler,
        fired_rx,
    } = daemon();
    tokio::spawn(wake_callback_task(Arc::clone(&state), fired_rx));

    call(&state, "POST", "/activate").await;
    call(&state, "POST", "/display/idle").await;
    call(&state, "POST", "/deactivate").await;
    let (_, status_body) = call(&state, "GET", "/status").await;
    assert_eq!(status_body["pending_wake_at"], T + 60);

    // Deadline reached; re-arm the way the daemon does at startup.
    clock.set(T + 60);
    scheduler.schedule(T + 60).unwrap();

    let mut status_body = Value::Null;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        status_body = call(&state, "GET", "/status").await.1;
        if status_body["timer"]["state"] == "done" {
            break;
        }
    }
    assert_eq!(status_body["timer"]["state"], "done");
    assert_eq!(status_body["timer"]["streak"], 1);
    assert_eq!(status_body["pending_wake_at"], Value::Null);
}
