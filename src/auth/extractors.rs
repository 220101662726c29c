use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::claims::TokenKind;
use super::jwt::JwtKeys;
use crate::error::AppError;

/// Extracts and validates the bearer access token, returning the user ID.
pub struct AuthUser(pub i64);

/// Like [`AuthUser`] but lets anonymous requests through as `None`.
/// A header that is present but invalid is still rejected.
pub struct MaybeAuthUser(pub Option<i64>);

fn user_from_parts(parts: &Parts, keys: &JwtKeys) -> Result<Option<i64>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

    let claims = keys.verify(token).map_err(|_| {
        warn!("invalid or expired token");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    if claims.kind != TokenKind::Access {
        return Err(AppError::Unauthorized("Access token required".into()));
    }

    Ok(Some(claims.sub))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        user_from_parts(parts, &keys)?
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        Ok(MaybeAuthUser(user_from_parts(parts, &keys)?))
    }
}
