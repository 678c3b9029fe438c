//! Liveness and readiness.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

/// Readiness gates on the vector store; the relational store is checked
/// lazily per request.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let vector_healthy = state.vector.health_check().await;

    let status = if vector_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "vector_store": if vector_healthy { "healthy" } else { "unhealthy" },
        })),
    )
}
