//! Bearer token authentication -> AuthenticatedIdentity in request extensions
//!
//! - `Authorization: Bearer <token>` を取り出し、Authenticator (cache-first) で検証する
//! - 成功時は AuthenticatedIdentity を extensions に格納し、handler / role gate に渡す
//! - ヘッダ不正の場合は store / provider に触れずに 401

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Require authentication on every route of `router`.
///
/// ```ignore
/// let authed = middleware::auth::access::apply(authed, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

/// Token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-sensitively. Surrounding whitespace is trimmed;
/// the token itself must be non-empty and contain no whitespace.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(AuthError::no_token)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(AuthError::no_token)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::no_token());
    }

    Ok(token)
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = match bearer_token(req.headers()) {
        Ok(token) => token,
        Err(err) => {
            tracing::debug!(path = %req.uri().path(), "missing or malformed bearer token");
            return Err(err.into());
        }
    };

    let identity = state.auth.authenticate(token).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
