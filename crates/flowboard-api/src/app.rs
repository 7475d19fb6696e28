use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;
use crate::{auth, requests};

/// Assemble the API router. Cross-cutting layers (CORS, tracing) are
/// the binary's concern.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify", post(auth::verify))
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/feature-requests",
            get(requests::list).post(requests::create),
        )
        .route("/api/feature-requests/seed", post(requests::seed))
        .route("/api/feature-requests/{id}/vote", post(requests::vote))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
