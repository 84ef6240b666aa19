/*
 * Responsibility
 * - 外部 IdP (Firebase Authentication) との境界
 * - IdentityVerifier trait: verify / get_role / set_role
 * - 実装は firebase.rs、鍵取得は jwks.rs、管理 API 用 OAuth は service_account.rs
 */
pub mod firebase;
pub mod jwks;
pub mod service_account;
pub mod verifier;

#[cfg(test)]
pub mod fake;

pub use firebase::FirebaseIdentity;
pub use verifier::{IdentityVerifier, VerifiedToken, VerifierError};
