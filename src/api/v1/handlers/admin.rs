/*
 * Responsibility
 * - /admin 系 handler
 * - access middleware + role gate (["admin"]) の内側でのみ呼ばれる
 */
use axum::{Json, extract::State};

use crate::{
    api::v1::{
        dto::{admin::SetRoleRequest, auth::MessageResponse},
        extractors::{ApiJson, AuthIdentity},
    },
    error::AppError,
    state::AppState,
};

pub async fn set_role(
    State(state): State<AppState>,
    AuthIdentity(admin): AuthIdentity,
    ApiJson(req): ApiJson<SetRoleRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    req.validate().map_err(AppError::bad_request)?;

    let uid = req.uid.trim();
    let role = req.role.trim();

    tracing::info!(by = %admin.subject_id, uid = %uid, role = %role, "set role requested");
    state.auth.set_role(uid, role).await?;

    Ok(Json(MessageResponse::ok(format!(
        "Role '{role}' set for user {uid}"
    ))))
}
