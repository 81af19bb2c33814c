use axum::{extract::State, response::Json};

use crate::{errors::Result, handlers::AppState, middleware::auth::AuthenticatedUser, models::QuotaResponse};

#[utoipa::path(
    get,
    path = "/user/quota",
    tag = "user",
    responses(
        (status = 200, description = "Today's quota usage", body = QuotaResponse),
        (status = 401, description = "Missing, invalid or expired session")
    )
)]
pub async fn get_quota(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<QuotaResponse>> {
    let limit = state.quota.daily_limit(user.id).await?;
    let used = state.quota.usage_today(user.id).await?;

    Ok(Json(QuotaResponse {
        used,
        limit,
        remaining: (limit - used).max(0),
    }))
}
