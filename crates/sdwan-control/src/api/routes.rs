//! `GET /api/v1/routes?agent_id=<id>` — solved routes for one agent.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use sdwan_common::models::RouteResponse;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoutesQuery {
    agent_id: String,
}

pub async fn fetch(
    State(state): State<AppState>,
    Query(query): Query<RoutesQuery>,
) -> Result<Json<RouteResponse>, ApiError> {
    if query.agent_id.trim().is_empty() {
        return Err(ApiError::bad_request("agent_id must not be empty"));
    }
    if !state.topology().exists(&query.agent_id) {
        return Err(ApiError::not_found(format!(
            "agent {} has not reported telemetry yet",
            query.agent_id
        )));
    }

    let snapshot = state.topology().get_all();
    let routes = state.solver().compute_routes_for(&query.agent_id, &snapshot);

    tracing::debug!(agent_id = %query.agent_id, route_count = routes.len(), "routes computed");

    Ok(Json(RouteResponse { routes }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use sdwan_common::config::ControllerConfig;
    use tower::ServiceExt;

    fn app_with_state(state: AppState) -> axum::Router {
        crate::api::router().with_state(state)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn unknown_agent_is_404() {
        let state = AppState::new(&ControllerConfig::default());
        let response = app_with_state(state)
            .oneshot(get("/api/v1/routes?agent_id=ghost"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_agent_id_is_bad_request() {
        let state = AppState::new(&ControllerConfig::default());
        let response = app_with_state(state)
            .oneshot(get("/api/v1/routes?agent_id="))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn posted_telemetry_with_no_finite_path_gets_empty_routes_on_fetch() {
        let state = AppState::new(&ControllerConfig::default());
        let router = app_with_state(state);

        let telemetry = serde_json::json!({
            "agent_id": "agent-a",
            "timestamp": 1,
            "metrics": [{"target_ip": "10.254.0.2", "rtt_ms": null, "loss_rate": 1.0}],
        });
        let post_response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/telemetry")
                    .header("content-type", "application/json")
                    .body(Body::from(telemetry.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(post_response.status(), StatusCode::OK);

        let get_response = router
            .oneshot(get("/api/v1/routes?agent_id=agent-a"))
            .await
            .unwrap();
        assert_eq!(get_response.status(), StatusCode::OK);
        let bytes = get_response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["routes"].as_array().unwrap().is_empty());
    }
}
