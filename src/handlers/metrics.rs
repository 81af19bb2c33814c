use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::{errors::Result, handlers::AppState};

pub async fn metrics_handler(State(state): State<AppState>) -> Result<Response> {
    let body = state.metrics.render()?;

    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}
