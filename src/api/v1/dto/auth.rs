/*
 * Responsibility
 * - /auth 系の request/response DTO
 * - JSON のキー名は既存クライアントに合わせる (tokenInfo, expiresAt)
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::auth::AuthenticatedIdentity;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthUserResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: AuthenticatedIdentity,
}

#[derive(Debug, Deserialize)]
pub struct CheckTokenRequest {
    #[serde(default)]
    pub token: String,
}

impl CheckTokenRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.token.trim().is_empty() {
            return Err("No token provided");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub uid: String,
    pub name: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CheckTokenResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(rename = "tokenInfo")]
    pub token_info: TokenInfo,
}
