/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - public / 認証必須 / admin (認証 + role gate) の 3 グループを merge
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{admin, auth, health::health};
use crate::middleware::auth::{access, roles};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/check-token", post(auth::check_token));

    let authed = Router::new()
        .route("/auth/verify", post(auth::verify))
        .route("/auth/validate", get(auth::validate))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logout-all", post(auth::logout_all));
    let authed = access::apply(authed, state.clone());

    // Layers wrap outward: access runs first, then the role gate.
    let admin = Router::new().route("/admin/set-role", post(admin::set_role));
    let admin = roles::require(admin, state.clone(), &["admin"]);
    let admin = access::apply(admin, state);

    public.merge(authed).merge(admin)
}
