use axum::{http::StatusCode, response::IntoResponse};
use tracing::info;

use crate::axum_http::error_responses::{ErrorResponse, json_response};

pub async fn not_found() -> impl IntoResponse {
    info!("router: not_found handler invoked");
    json_response(
        StatusCode::NOT_FOUND,
        &ErrorResponse {
            error: "Not Found".to_string(),
            details: None,
        },
    )
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}
