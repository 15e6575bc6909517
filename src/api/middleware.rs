use crate::error::{AppError, Result};
use crate::models::normalize_bearer;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

/// Spotify access token from the `Authorization` header.
///
/// Accepts both the bare token and `Bearer <token>`. Use
/// `Option<BearerToken>` where the token is optional.
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(normalize_bearer)
            .ok_or_else(|| AppError::InvalidRequest("Access token is required!".to_string()))?;

        Ok(BearerToken(token.to_string()))
    }
}
