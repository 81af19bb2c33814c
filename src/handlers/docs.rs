use axum::response::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::ocr::recognize,
        crate::handlers::ocr::history,
        crate::handlers::ocr::clear_history,
        crate::handlers::user::get_quota,
        crate::handlers::admin::get_engine_config,
        crate::handlers::admin::set_engine_token,
        crate::handlers::admin::set_engine_url,
        crate::handlers::admin::list_users,
        crate::handlers::admin::update_user_limit,
    ),
    components(
        schemas(
            crate::models::RegisterRequest,
            crate::models::LoginRequest,
            crate::models::AuthResponse,
            crate::models::Role,
            crate::models::OcrRequest,
            crate::models::OcrBox,
            crate::models::OcrResult,
            crate::models::OcrRecord,
            crate::models::QuotaResponse,
            crate::models::EngineConfigResponse,
            crate::models::SetEngineTokenRequest,
            crate::models::SetEngineUrlRequest,
            crate::models::UserUsageResponse,
            crate::models::UpdateUserLimitRequest,
        )
    ),
    tags(
        (name = "ocr", description = "OCR submission and history"),
        (name = "auth", description = "Registration and login"),
        (name = "user", description = "Per-user quota"),
        (name = "admin", description = "Engine settings and user limits"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "OCR Gateway API",
        version = "1.0.0",
        description = "Authenticated, quota-limited gateway in front of an OCR engine"
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
