//! Registration, login, identity.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{AuthResponse, CurrentUser};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let response = state
        .auth
        .register(&request.username, &request.password)
        .await?;
    Ok(Json(response))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let response = state.auth.login(&request.username, &request.password).await?;
    Ok(Json(response))
}

pub async fn me(current_user: CurrentUser) -> Json<Value> {
    Json(json!({
        "id": current_user.id,
        "username": current_user.username,
    }))
}
