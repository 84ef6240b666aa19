//! Role gate: live role lookup + allow-list
//!
//! access middleware の内側 (後段) に置く。AuthenticatedIdentity が無ければ 401。
//! 許可された場合は fresh な role を持つ identity で extensions を置き換える。

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::{AuthError, AuthenticatedIdentity};
use crate::state::AppState;

#[derive(Clone)]
struct RoleGate {
    state: AppState,
    allowed: Arc<[String]>,
}

/// Restrict `router` to subjects whose live role is in `allowed`.
/// An empty list only requires that the subject still exists.
///
/// Apply before `access::apply` so authentication runs first.
pub fn require(router: Router<AppState>, state: AppState, allowed: &[&str]) -> Router<AppState> {
    let gate = RoleGate {
        state,
        allowed: allowed.iter().map(|r| r.to_string()).collect(),
    };

    router.route_layer(middleware::from_fn_with_state(gate, role_middleware))
}

async fn role_middleware(
    State(gate): State<RoleGate>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<AuthenticatedIdentity>()
        .cloned()
        .ok_or_else(AuthError::no_token)?;

    let authorized = gate.state.auth.authorize(&identity, &gate.allowed).await?;

    req.extensions_mut().insert(authorized);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use super::*;
    use crate::api::v1::extractors::AuthIdentity;
    use crate::services::auth::Authenticator;
    use crate::services::identity::fake::FakeVerifier;
    use crate::services::token_store::MemoryTokenStore;

    fn state(verifier: FakeVerifier) -> AppState {
        AppState::new(Arc::new(Authenticator::new(
            Arc::new(MemoryTokenStore::new()),
            Arc::new(verifier),
        )))
    }

    async fn whoami(AuthIdentity(identity): AuthIdentity) -> String {
        identity.role
    }

    #[tokio::test]
    async fn gate_without_identity_is_401() {
        let state = state(FakeVerifier::new());
        let app = require(
            Router::new().route("/", get(whoami)),
            state.clone(),
            &[],
        )
        .with_state(state);

        let res = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn gate_replaces_identity_with_live_role() {
        let state = state(FakeVerifier::new().with_role("U1", "editor"));
        let app = require(
            Router::new().route("/", get(whoami)),
            state.clone(),
            &["editor", "admin"],
        )
        .with_state(state);

        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(AuthenticatedIdentity::new("U1", "Alice", "user"));

        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"editor");
    }
}
