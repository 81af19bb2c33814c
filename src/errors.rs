use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why a bearer token was refused. Every variant is terminal for the request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization Bearer token")]
    MissingToken,

    #[error("Malformed token")]
    Malformed,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Token does not match session")]
    UserMismatch,

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid username or password")]
    InvalidCredentials,
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "auth_missing_token",
            AuthError::Malformed => "auth_malformed",
            AuthError::SessionNotFound => "auth_session_not_found",
            AuthError::UserMismatch => "auth_user_mismatch",
            AuthError::SessionExpired => "auth_session_expired",
            AuthError::InvalidCredentials => "auth_invalid_credentials",
        }
    }
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image could not be decoded: {0}")]
    Decode(String),

    #[error("Image is still larger than {ceiling} bytes after {attempts} attempts (last: {last_size} bytes)")]
    CompressionLimitExceeded {
        attempts: u32,
        ceiling: usize,
        last_size: usize,
    },

    #[error("Image processing failed: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("OCR engine request failed: {0}")]
    Transport(String),

    #[error("OCR engine returned status {0}")]
    Status(u16),

    #[error("OCR engine response could not be parsed: {0}")]
    Protocol(String),

    #[error("OCR engine error code {0}")]
    EngineCode(i64),
}

impl UpstreamError {
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Transport(_) => "upstream_transport",
            UpstreamError::Status(_) => "upstream_status",
            UpstreamError::Protocol(_) => "upstream_protocol",
            UpstreamError::EngineCode(_) => "upstream_engine_code",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Daily quota exceeded ({used}/{limit})")]
    QuotaExceeded { used: i64, limit: i64 },

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Auth(e) => e.kind(),
            AppError::QuotaExceeded { .. } => "quota_exceeded",
            AppError::Image(ImageError::Decode(_)) => "decode_failure",
            AppError::Image(ImageError::CompressionLimitExceeded { .. }) => {
                "compression_limit_exceeded"
            }
            AppError::Upstream(e) => e.kind(),
            AppError::Validation(_) => "validation",
            AppError::PayloadTooLarge => "payload_too_large",
            AppError::NotFound => "not_found",
            AppError::Forbidden => "forbidden",
            AppError::Database(_) | AppError::Image(ImageError::Internal(_)) | AppError::Internal(_) => {
                "internal"
            }
        }
    }

    /// Numeric code kept compatible with existing clients.
    pub fn errcode(&self) -> i32 {
        match self {
            AppError::Image(ImageError::Decode(_)) => 1,
            AppError::Image(ImageError::CompressionLimitExceeded { .. }) => 2,
            AppError::Upstream(_) => 3,
            AppError::Auth(_) => 4,
            AppError::QuotaExceeded { .. } => 6,
            AppError::Forbidden => 7,
            _ => 5,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Image(ImageError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Image(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Image(ImageError::Internal(ref msg)) => {
                tracing::error!("Image processing error: {}", msg);
                "Image processing failed".to_string()
            }
            AppError::Upstream(ref e) => {
                tracing::error!("Upstream OCR error: {}", e);
                "OCR engine call failed".to_string()
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            AppError::Auth(ref e @ (AuthError::InvalidCredentials | AuthError::MissingToken)) => {
                e.to_string()
            }
            AppError::Auth(_) => "Invalid token or session expired".to_string(),
            ref other => other.to_string(),
        };

        let mut body = json!({
            "errcode": self.errcode(),
            "kind": self.kind(),
            "error": message,
            "status": status.as_u16()
        });

        if let AppError::QuotaExceeded { used, limit } = self {
            body["used"] = json!(used);
            body["limit"] = json!(limit);
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
