//! `POST /api/v1/telemetry` — ingest one agent's smoothed link metrics.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use sdwan_common::models::TelemetryReport;

use crate::api::error::ApiError;
use crate::state::AppState;

pub async fn ingest(
    State(state): State<AppState>,
    Json(report): Json<TelemetryReport>,
) -> Result<Json<Value>, ApiError> {
    report.validate().map_err(ApiError::from)?;

    state
        .topology()
        .store(&report.agent_id, report.timestamp, &report.metrics);

    tracing::info!(
        agent_id = %report.agent_id,
        metric_count = report.metrics.len(),
        "telemetry accepted"
    );

    Ok(Json(json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use sdwan_common::config::ControllerConfig;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        let state = AppState::new(&ControllerConfig::default());
        crate::api::router().with_state(state)
    }

    #[tokio::test]
    async fn accepts_valid_telemetry() {
        let body = serde_json::json!({
            "agent_id": "agent-a",
            "timestamp": 1_700_000_000i64,
            "metrics": [{"target_ip": "10.254.0.2", "rtt_ms": 12.0, "loss_rate": 0.0}],
        });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/telemetry")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rejects_empty_metrics_with_422() {
        let body = serde_json::json!({
            "agent_id": "agent-a",
            "timestamp": 1_700_000_000i64,
            "metrics": [],
        });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/telemetry")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn rejects_malformed_json_with_400() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/telemetry")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let _ = response.into_body().collect().await;
    }
}
