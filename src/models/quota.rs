use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub id: i64,
    pub user_id: i64,
    pub ip: String,
    pub date: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a quota check. `used` and `limit` are accurate as of the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaDecision {
    pub admitted: bool,
    pub used: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuotaResponse {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
}
