use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct OcrRecord {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OcrRequest {
    /// Base64 encoded JPEG or PNG.
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OcrBox {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OcrResult {
    pub errcode: i32,
    pub msg: String,
    pub text: String,
    pub boxes: Vec<OcrBox>,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetEngineTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetEngineUrlRequest {
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EngineConfigResponse {
    pub has_token: bool,
    pub has_url: bool,
    pub current_url: String,
}
