use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::{
    errors::Result,
    handlers::AppState,
    models::{AuthResponse, LoginRequest, RegisterRequest},
};

#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Invalid or duplicate username, or password too short")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let user = state.accounts.register(&request.username, &request.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "errcode": 0,
            "msg": "registered",
            "data": {
                "id": user.id,
                "username": user.username,
                "role": user.role
            }
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = AuthResponse),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let response = state.accounts.login(&request.username, &request.password).await?;
    Ok(Json(response))
}
