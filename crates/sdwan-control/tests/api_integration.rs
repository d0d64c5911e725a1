//! API integration tests for sdwan-control.
//!
//! These tests exercise the REST API through axum's tower service interface
//! (no TCP, no live listener), driving the `Router` directly the way the
//! teacher's `tests/api_integration.rs` does.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use sdwan_common::config::ControllerConfig;
use sdwan_control::state::AppState;

fn test_app() -> Router {
    let state = AppState::new(&ControllerConfig::default());
    sdwan_control::api::router().with_state(state)
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn telemetry(agent_id: &str, target: &str, rtt_ms: Option<f64>, loss_rate: f64) -> serde_json::Value {
    serde_json::json!({
        "agent_id": agent_id,
        "timestamp": 1_700_000_000i64,
        "metrics": [{"target_ip": target, "rtt_ms": rtt_ms, "loss_rate": loss_rate}],
    })
}

#[tokio::test]
async fn telemetry_round_trips_through_the_full_http_stack() {
    let app = test_app();

    let resp = app
        .clone()
        .oneshot(json_post(
            "/api/v1/telemetry",
            telemetry("agent-a", "10.254.0.2", Some(20.0), 0.0),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(get("/api/v1/routes?agent_id=agent-a"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let routes = body["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["dst_cidr"], "10.254.0.2/32");
    assert_eq!(routes[0]["next_hop"], "direct");
    assert_eq!(routes[0]["reason"], "default");
}

#[tokio::test]
async fn telemetry_validation_failures_are_rejected_with_422() {
    let app = test_app();

    let resp = app
        .clone()
        .oneshot(json_post(
            "/api/v1/telemetry",
            serde_json::json!({
                "agent_id": "agent-a",
                "timestamp": 1_700_000_000i64,
                "metrics": [],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .clone()
        .oneshot(json_post(
            "/api/v1/telemetry",
            serde_json::json!({
                "agent_id": "agent-a",
                "timestamp": 1_700_000_000i64,
                "metrics": [{"target_ip": "10.254.0.2", "rtt_ms": 10.0, "loss_rate": 2.0}],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .oneshot(json_post(
            "/api/v1/telemetry",
            serde_json::json!({
                "agent_id": "agent-a",
                "timestamp": 0,
                "metrics": [{"target_ip": "10.254.0.2", "rtt_ms": 10.0, "loss_rate": 0.0}],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn health_reports_agent_count_across_zero_one_and_several_agents() {
    let app = test_app();

    let resp = app.clone().oneshot(get("/health")).await.unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["agent_count"], 0);

    app.clone()
        .oneshot(json_post(
            "/api/v1/telemetry",
            telemetry("agent-a", "10.254.0.2", Some(10.0), 0.0),
        ))
        .await
        .unwrap();
    let resp = app.clone().oneshot(get("/health")).await.unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["agent_count"], 1);

    app.clone()
        .oneshot(json_post(
            "/api/v1/telemetry",
            telemetry("agent-b", "10.254.0.3", Some(10.0), 0.0),
        ))
        .await
        .unwrap();
    let resp = app.oneshot(get("/health")).await.unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["agent_count"], 2);
}

#[tokio::test]
async fn unknown_agent_routes_fetch_is_404() {
    let app = test_app();
    let resp = app.oneshot(get("/api/v1/routes?agent_id=unknown")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
