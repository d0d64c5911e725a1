//! `GET /health` — liveness probe reporting how many agents are known.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "agent_count": state.topology().count(),
    }))
}
