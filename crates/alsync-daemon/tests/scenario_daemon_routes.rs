//! In-process scenario tests for alsync-daemon HTTP endpoints.
//!
//! The router is driven via `tower::ServiceExt::oneshot`; no socket is bound.

use std::sync::Arc;

use alsync_daemon::{routes, service::SyncMode, state};
use alsync_reconcile::{ReconcileReport, Transition};
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let st = Arc::new(state::AppState::new(SyncMode::Registry));
    let (status, body) = call(routes::build_router(st), get("/v1/health")).await;

    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "alsync-daemon");
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_status_is_starting_with_no_pass() {
    let st = Arc::new(state::AppState::new(SyncMode::Simulate));
    let (status, body) = call(routes::build_router(st), get("/v1/status")).await;

    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["mode"], "simulate");
    assert_eq!(json["state"], "starting");
    assert_eq!(json["known_alarms"], 0);
    assert_eq!(json["passes"], 0);
    assert!(json["last_pass"].is_null());
    assert!(json["last_error"].is_null());
}

#[tokio::test]
async fn status_reflects_published_pass() {
    let st = Arc::new(state::AppState::new(SyncMode::Registry));
    let report = ReconcileReport {
        transitions: vec![
            Transition::Added {
                id: "a".to_string(),
                epoch_seconds: 1_893_492_000,
            },
            Transition::NotKnown { id: "z".to_string() },
        ],
    };
    st.publish_pass(vec!["a".to_string()], Some(&report)).await;
    st.set_state("running").await;

    let (_, body) = call(routes::build_router(Arc::clone(&st)), get("/v1/status")).await;
    let json = parse_json(body);

    assert_eq!(json["state"], "running");
    assert_eq!(json["known_alarms"], 1);
    assert_eq!(json["passes"], 1);
    assert_eq!(json["last_pass"]["records"], 2);
    assert_eq!(json["last_pass"]["added"], 1);
    assert_eq!(json["last_pass"]["unchanged"], 1);
    assert!(json["last_pass_at_millis"].is_i64());
}

#[tokio::test]
async fn recorded_error_shows_until_next_clean_pass() {
    let st = Arc::new(state::AppState::new(SyncMode::Registry));
    st.record_error("SCHEDULER_UNAVAILABLE: down".to_string()).await;

    let (_, body) = call(routes::build_router(Arc::clone(&st)), get("/v1/status")).await;
    assert_eq!(parse_json(body)["last_error"], "SCHEDULER_UNAVAILABLE: down");

    st.publish_pass(Vec::new(), Some(&ReconcileReport::empty())).await;
    let (_, body) = call(routes::build_router(Arc::clone(&st)), get("/v1/status")).await;
    assert!(parse_json(body)["last_error"].is_null());
}

// ---------------------------------------------------------------------------
// GET /v1/alarms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn alarms_lists_known_ids_in_order() {
    let st = Arc::new(state::AppState::new(SyncMode::Registry));
    st.publish_pass(
        vec!["b".to_string(), "a".to_string(), "c".to_string()],
        Some(&ReconcileReport::empty()),
    )
    .await;

    let (status, body) = call(routes::build_router(st), get("/v1/alarms")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["mode"], "registry");
    assert_eq!(json["count"], 3);
    assert_eq!(json["known_ids"], serde_json::json!(["b", "a", "c"]));
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pass_publishes_alarm_events_then_status() {
    let st = Arc::new(state::AppState::new(SyncMode::Registry));
    let mut rx = st.bus.subscribe();

    let report = ReconcileReport {
        transitions: vec![
            Transition::Added {
                id: "c".to_string(),
                epoch_seconds: 42,
            },
            Transition::Removed { id: "a".to_string() },
        ],
    };
    st.publish_pass(vec!["c".to_string()], Some(&report)).await;

    let names: Vec<&'static str> = (0..3)
        .map(|_| rx.try_recv().expect("bus message").event_name())
        .collect();
    assert_eq!(names, vec!["alarm_added", "alarm_removed", "status"]);
}

// ---------------------------------------------------------------------------
// GET /v1/stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_responds_with_event_stream() {
    let st = Arc::new(state::AppState::new(SyncMode::Registry));
    let resp = routes::build_router(st)
        .oneshot(get("/v1/stream"))
        .await
        .expect("oneshot failed");

    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(ct.starts_with("text/event-stream"), "got: {ct}");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let st = Arc::new(state::AppState::new(SyncMode::Registry));
    let (status, _) = call(routes::build_router(st), get("/v1/alarms/add")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
