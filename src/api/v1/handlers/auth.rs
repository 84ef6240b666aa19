/*
 * Responsibility
 * - /auth 系 handler (verify / validate / logout / logout-all / check-token)
 * - 認証は access middleware 済み。handler は Authenticator を呼んで整形するだけ
 */
use axum::{Json, extract::State};
use chrono::DateTime;

use crate::{
    api::v1::{
        dto::auth::{
            AuthUserResponse, CheckTokenRequest, CheckTokenResponse, MessageResponse, TokenInfo,
        },
        extractors::{ApiJson, AuthIdentity, BearerToken},
    },
    error::AppError,
    services::auth::AuthError,
    state::AppState,
};

pub async fn verify(AuthIdentity(identity): AuthIdentity) -> Json<AuthUserResponse> {
    Json(AuthUserResponse {
        success: true,
        message: "Token verification successful",
        user: identity,
    })
}

pub async fn validate(AuthIdentity(identity): AuthIdentity) -> Json<AuthUserResponse> {
    Json(AuthUserResponse {
        success: true,
        message: "User is authenticated",
        user: identity,
    })
}

pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.revoke(&token).await?;

    Ok(Json(MessageResponse::ok("Token invalidated successfully")))
}

pub async fn logout_all(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
) -> Result<Json<MessageResponse>, AppError> {
    let removed = state.auth.revoke_all(&identity.subject_id).await?;

    Ok(Json(MessageResponse::ok(format!(
        "All tokens invalidated successfully ({removed} tokens removed)"
    ))))
}

/// Public: asks the provider directly, never reads or writes the cache.
pub async fn check_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CheckTokenRequest>,
) -> Result<Json<CheckTokenResponse>, AppError> {
    req.validate().map_err(AppError::bad_request)?;

    let verified = state.auth.check_token(req.token.trim()).await?;
    let expires_at = DateTime::from_timestamp(verified.expires_at_epoch_seconds, 0)
        .ok_or_else(AuthError::invalid_token)?;

    Ok(Json(CheckTokenResponse {
        success: true,
        message: "Token is valid",
        token_info: TokenInfo {
            uid: verified.subject_id,
            name: verified.subject_name,
            expires_at,
        },
    }))
}
