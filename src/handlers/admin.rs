use axum::{extract::State, response::Json};
use serde_json::json;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::auth::AdminUser,
    models::{EngineConfigResponse, SetEngineTokenRequest, SetEngineUrlRequest, UpdateUserLimitRequest, UserUsageResponse},
    services::{ENGINE_TOKEN_KEY, ENGINE_URL_KEY},
};

/// Reports whether a token is configured without ever revealing it.
#[utoipa::path(
    get,
    path = "/admin/ocr-config",
    tag = "admin",
    responses(
        (status = 200, description = "Effective engine configuration", body = EngineConfigResponse),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn get_engine_config(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<EngineConfigResponse>> {
    let endpoint = state.settings.engine_endpoint(&state.config.ocr_engine()).await;

    Ok(Json(EngineConfigResponse {
        has_token: endpoint.token.is_some(),
        has_url: endpoint.url_configured,
        current_url: endpoint.url,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/ocr-token",
    tag = "admin",
    request_body = SetEngineTokenRequest,
    responses(
        (status = 200, description = "Token stored"),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn set_engine_token(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<SetEngineTokenRequest>,
) -> Result<Json<serde_json::Value>> {
    let token = request.token.trim();
    if token.is_empty() {
        return Err(AppError::Validation("Token must not be empty".to_string()));
    }

    state.settings.set(ENGINE_TOKEN_KEY, token).await?;
    tracing::info!(admin_id = admin.id, "OCR engine token updated");

    Ok(Json(json!({ "errcode": 0, "msg": "saved" })))
}

#[utoipa::path(
    post,
    path = "/admin/ocr-url",
    tag = "admin",
    request_body = SetEngineUrlRequest,
    responses(
        (status = 200, description = "URL stored"),
        (status = 400, description = "URL is not http(s)"),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn set_engine_url(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<SetEngineUrlRequest>,
) -> Result<Json<serde_json::Value>> {
    let url = request.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::Validation("URL must start with http:// or https://".to_string()));
    }

    state.settings.set(ENGINE_URL_KEY, url).await?;
    tracing::info!(admin_id = admin.id, url, "OCR engine URL updated");

    Ok(Json(json!({ "errcode": 0, "msg": "saved" })))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    responses(
        (status = 200, description = "All users with today's usage", body = [UserUsageResponse]),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Vec<UserUsageResponse>>> {
    Ok(Json(state.accounts.list_users_with_usage().await?))
}

#[utoipa::path(
    put,
    path = "/admin/users/limit",
    tag = "admin",
    request_body = UpdateUserLimitRequest,
    responses(
        (status = 200, description = "Limit updated"),
        (status = 400, description = "Limit below one"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn update_user_limit(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<UpdateUserLimitRequest>,
) -> Result<Json<serde_json::Value>> {
    if request.limit < 1 {
        return Err(AppError::Validation("Limit must be at least 1".to_string()));
    }

    state.quota.update_daily_limit(request.user_id, request.limit).await?;
    tracing::info!(admin_id = admin.id, user_id = request.user_id, limit = request.limit, "Admin changed daily limit");

    Ok(Json(json!({ "errcode": 0, "msg": "updated" })))
}
