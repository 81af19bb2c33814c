use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::auth::{AuthenticatedUser, BearerToken},
    models::{OcrRequest, OcrResult},
    services::OcrSubmission,
    utils::ClientIp,
};

/// The token is checked for presence before the body is looked at; full
/// session validation happens inside the pipeline.
#[utoipa::path(
    post,
    path = "/ocr",
    tag = "ocr",
    request_body = OcrRequest,
    responses(
        (status = 200, description = "Recognised text and boxes", body = OcrResult),
        (status = 400, description = "Image could not be decoded or compressed"),
        (status = 401, description = "Missing, invalid or expired session"),
        (status = 413, description = "Request body exceeds the configured limit"),
        (status = 429, description = "Daily quota exhausted"),
        (status = 502, description = "OCR engine failure")
    )
)]
pub async fn recognize(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    ClientIp(client_ip): ClientIp,
    body: std::result::Result<Json<OcrRequest>, JsonRejection>,
) -> Result<Json<OcrResult>> {
    let Json(request) = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::Validation(format!("Invalid request body: {}", e.body_text()))
        }
    })?;

    let admitted = state
        .pipeline
        .run(OcrSubmission {
            token,
            client_ip,
            image_base64: request.image,
        })
        .await?;

    Ok(Json(admitted.result))
}

#[utoipa::path(
    get,
    path = "/ocr/history",
    tag = "ocr",
    responses(
        (status = 200, description = "Most recent recognitions, newest first"),
        (status = 401, description = "Missing, invalid or expired session")
    )
)]
pub async fn history(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<serde_json::Value>> {
    let records = state.history.recent(user.id, state.history.limit()).await?;

    Ok(Json(json!({
        "errcode": 0,
        "msg": "success",
        "data": records
    })))
}

#[utoipa::path(
    delete,
    path = "/ocr/history",
    tag = "ocr",
    responses(
        (status = 200, description = "History cleared"),
        (status = 401, description = "Missing, invalid or expired session")
    )
)]
pub async fn clear_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>> {
    let deleted = state.history.clear(user.id).await?;
    tracing::info!(user_id = user.id, deleted, "OCR history cleared");

    Ok(Json(json!({
        "errcode": 0,
        "msg": "cleared",
        "deleted": deleted
    })))
}
