use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::middleware::auth::access::bearer_token;
use crate::services::auth::{AuthError, AuthenticatedIdentity};
use crate::state::AppState;

/// Handler で AuthenticatedIdentity を受け取るための extractor
/// access middleware が request.extensions() に insert 済みである前提
/// 見つからない場合は 401 (middleware 未適用のルート)
pub struct AuthIdentity(pub AuthenticatedIdentity);

impl FromRequestParts<AppState> for AuthIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .map(AuthIdentity)
            .ok_or_else(|| AuthError::no_token().into())
    }
}

/// The raw token from `Authorization: Bearer <token>`.
pub struct BearerToken(pub String);

impl FromRequestParts<AppState> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        Ok(BearerToken(token.to_string()))
    }
}
