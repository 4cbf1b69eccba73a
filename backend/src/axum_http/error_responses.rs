use anyhow::anyhow;
use axum::{
    body::Body,
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::any::Any;
use thiserror::Error;
use tracing::{error, warn};

use crate::usecases::subscriptions::SubscriptionError;

const ENCODE_FALLBACK_BODY: &str = r#"{"error": "failed to encode error"}"#;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("error decoding request: {0}")]
    Decode(String),

    #[error("error encoding response: {0}")]
    Encode(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("subscription not found")]
    NotFound,

    #[error("{0}")]
    AlreadyExists(String),

    #[error("secret-key header is missing or invalid")]
    Unauthorized,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<SubscriptionError> for AppError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::InvalidInput(reason) => AppError::InvalidInput(reason),
            SubscriptionError::NotFound => AppError::NotFound,
            SubscriptionError::AlreadyExists(reason) => AppError::AlreadyExists(reason),
            SubscriptionError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Decode(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Encode(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        let (message, details) = match self {
            AppError::Decode(reason) => ("Invalid Request Format", Some(reason.clone())),
            AppError::Encode(_) => ("Failed to process Response", None),
            AppError::InvalidInput(reason) => ("Validation failed", Some(reason.clone())),
            AppError::NotFound => ("No subscription found", None),
            AppError::AlreadyExists(reason) => ("Validation failed", Some(reason.clone())),
            AppError::Unauthorized => ("Unauthorized", Some(self.to_string())),
            // Don't leak internal error detail to client
            AppError::Internal(_) => ("An error occurred", Some(self.to_string())),
        };

        ErrorResponse {
            error: message.to_string(),
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Internal(err) => error!(error = ?err, "http: internal error"),
            AppError::Encode(err) => error!(error = %err, "http: response encoding failed"),
            _ => {}
        }

        match serde_json::to_vec(&self.body()) {
            Ok(bytes) => json_bytes(status, bytes),
            Err(err) => {
                error!(error = %err, "http: failed to encode error body");
                (StatusCode::INTERNAL_SERVER_ERROR, ENCODE_FALLBACK_BODY).into_response()
            }
        }
    }
}

/// Serializes `body` as the JSON response, reporting encode failures as [`AppError::Encode`].
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => json_bytes(status, bytes),
        Err(err) => AppError::Encode(err.to_string()).into_response(),
    }
}

fn json_bytes(status: StatusCode, bytes: Vec<u8>) -> Response {
    (
        status,
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        bytes,
    )
        .into_response()
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Rewrites error responses produced outside the handlers (body limit, timeout,
/// unrouted method) into the JSON error body. Other headers such as `Allow` are kept.
pub async fn json_error_responses(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }

    let body = ErrorResponse {
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        details: None,
    };
    let bytes = match serde_json::to_vec(&body) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(error = %err, "http: failed to encode error body");
            ENCODE_FALLBACK_BODY.as_bytes().to_vec()
        }
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    warn!(status = status.as_u16(), "http: request rejected before reaching a handler");

    Response::from_parts(parts, Body::from(bytes))
}

/// Turns a handler panic into a 500 with the usual internal error body.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(anyhow!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::to_bytes,
        http::{Request, header::ALLOW},
        routing::get,
    };
    use tower::ServiceExt;
    use tower_http::catch_panic::CatchPanicLayer;
    use serde_json::Value;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause() {
        let (status, body) = render(AppError::Internal(anyhow!("password=hunter2"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An error occurred");
        assert_eq!(body["details"], "Internal server error");
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn conflicts_map_to_409_with_reason() {
        let (status, body) = render(AppError::AlreadyExists("overlaps".to_string())).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"], "overlaps");
    }

    #[tokio::test]
    async fn not_found_has_no_details() {
        let (status, body) = render(AppError::NotFound).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No subscription found");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn unauthorized_and_decode_statuses() {
        assert_eq!(render(AppError::Unauthorized).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            render(AppError::Decode("missing field".to_string())).await.0,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn usecase_errors_keep_their_status() {
        for err in [
            SubscriptionError::InvalidInput("bad".to_string()),
            SubscriptionError::NotFound,
            SubscriptionError::AlreadyExists("dup".to_string()),
            SubscriptionError::Internal(anyhow!("boom")),
        ] {
            let expected = err.status_code();
            assert_eq!(AppError::from(err).status_code(), expected);
        }
    }

    #[tokio::test]
    async fn plain_layer_errors_become_json() {
        for status in [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::PAYLOAD_TOO_LARGE,
            StatusCode::METHOD_NOT_ALLOWED,
        ] {
            let mut plain = (status, "length limit exceeded").into_response();
            plain
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET,POST"));

            let response = json_error_responses(plain).await;

            assert_eq!(response.status(), status);
            assert!(is_json(&response));
            assert_eq!(response.headers()[ALLOW], "GET,POST");
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["error"], status.canonical_reason().unwrap());
        }
    }

    #[tokio::test]
    async fn json_and_success_responses_pass_through() {
        let response = json_error_responses(AppError::NotFound.into_response()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "No subscription found");

        let ok = json_error_responses((StatusCode::OK, "OK").into_response()).await;
        let bytes = to_bytes(ok.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    async fn boom() -> &'static str {
        panic!("secret detail")
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let app = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "An error occurred");
        assert!(!body.to_string().contains("secret detail"));
    }
}
