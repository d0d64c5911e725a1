//! REST API route tree.

pub mod error;
pub mod health;
pub mod routes;
pub mod telemetry;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` router plus the top-level `/health` route.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .route("/telemetry", axum::routing::post(telemetry::ingest))
                .route("/routes", axum::routing::get(routes::fetch)),
        )
        .route("/health", axum::routing::get(health::check))
}
