pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{admin, auth as auth_handlers, docs, health, metrics, ocr, user, AppState};

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let max_request_bytes = state.config.max_request_bytes;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/api-docs/openapi.json", get(docs::openapi_json))
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/ocr", post(ocr::recognize))
        .route("/ocr/history", get(ocr::history).delete(ocr::clear_history))
        .route("/user/quota", get(user::get_quota))
        .route("/admin/ocr-config", get(admin::get_engine_config))
        .route("/admin/ocr-token", post(admin::set_engine_token))
        .route("/admin/ocr-url", post(admin::set_engine_url))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/limit", put(admin::update_user_limit))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::metrics_middleware,
        ))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}
