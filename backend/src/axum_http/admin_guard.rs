use anyhow::anyhow;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{axum_http::error_responses::AppError, config::config_model::AdminSecret};

pub const ADMIN_SECRET_HEADER: &str = "secret-key";

/// Extractor that only succeeds when the `secret-key` header equals the configured
/// [`AdminSecret`]. The secret is provided to the router as an `Extension`.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

#[async_trait]
impl<S> FromRequestParts<S> for AdminAccess
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let expected = parts
            .extensions
            .get::<AdminSecret>()
            .ok_or_else(|| AppError::Internal(anyhow!("admin secret is not configured")))?;

        let provided = parts
            .headers
            .get(ADMIN_SECRET_HEADER)
            .map(|value| value.as_bytes());

        match provided {
            Some(provided) if secrets_match(provided, expected.secret.as_bytes()) => Ok(AdminAccess),
            Some(_) => {
                warn!(path = %parts.uri.path(), "admin_guard: invalid secret-key header");
                Err(AppError::Unauthorized)
            }
            None => {
                warn!(path = %parts.uri.path(), "admin_guard: missing secret-key header");
                Err(AppError::Unauthorized)
            }
        }
    }
}

/// Compares in time independent of where the first mismatch is.
fn secrets_match(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }

    provided
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
