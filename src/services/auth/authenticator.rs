//! Cache-first bearer authentication and role authorization.
//!
//! authenticate:
//! 1. Token Store hit (unexpired) -> cached identity, provider untouched.
//! 2. Miss -> provider `verify`, then cache the result until the token's `exp`.
//!
//! authorize always asks the provider for the live role; the cached role is
//! only trusted on routes without a role gate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::services::auth::{AuthError, AuthenticatedIdentity};
use crate::services::identity::{IdentityVerifier, VerifiedToken, VerifierError};
use crate::services::token_store::{CachedToken, DEFAULT_ROLE, TokenStore, TokenStoreError};

const AUTHENTICATION_FAULT: &str = "Internal server error during authentication.";
const AUTHORIZATION_FAULT: &str = "Internal server error during authorization.";
const LOGOUT_FAULT: &str = "Failed to invalidate token";
const SET_ROLE_FAULT: &str = "Failed to set role";

pub struct Authenticator {
    store: Arc<dyn TokenStore>,
    verifier: Arc<dyn IdentityVerifier>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn TokenStore>, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self { store, verifier }
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedIdentity, AuthError> {
        let fp = fingerprint(token);

        let cached = self
            .store
            .lookup(token)
            .await
            .map_err(|e| AuthError::internal(AUTHENTICATION_FAULT, e))?;

        if let Some(record) = cached {
            debug!(token = %fp, uid = %record.subject_id, "token cache hit");
            return Ok(record.identity());
        }

        let verified = self.verify(token, &fp).await?;

        let role = verified.role.as_deref().unwrap_or(DEFAULT_ROLE);
        let identity =
            AuthenticatedIdentity::new(&verified.subject_id, &verified.subject_name, role);

        let Some(expires_at) = DateTime::from_timestamp(verified.expires_at_epoch_seconds, 0)
        else {
            warn!(token = %fp, "token exp out of range");
            return Err(AuthError::invalid_token());
        };

        let now = Utc::now();
        if expires_at <= now {
            // Verified but already past exp (leeway); serve this request only.
            debug!(token = %fp, "token not cached: already expired");
            return Ok(identity);
        }

        let record = CachedToken {
            token: token.to_string(),
            subject_id: identity.subject_id.clone(),
            subject_name: identity.subject_name.clone(),
            role: identity.role.clone(),
            expires_at,
            created_at: now,
        };

        match self.store.insert(record).await {
            Ok(()) => {
                debug!(token = %fp, uid = %identity.subject_id, "token cached");
            }
            Err(TokenStoreError::Conflict) => {
                // A concurrent request cached the same token first.
                debug!(token = %fp, "token already cached");
            }
            Err(e) => return Err(AuthError::internal(AUTHENTICATION_FAULT, e)),
        }

        Ok(identity)
    }

    /// Role gate: fetch the live role and check it against `allowed`.
    ///
    /// An empty allow-list admits any role. On success the returned identity
    /// carries the fresh role.
    pub async fn authorize(
        &self,
        identity: &AuthenticatedIdentity,
        allowed: &[String],
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let role = self
            .verifier
            .get_role(&identity.subject_id)
            .await
            .map_err(|e| AuthError::internal(AUTHORIZATION_FAULT, e))?;

        if !allowed.is_empty() && !allowed.iter().any(|r| *r == role) {
            warn!(uid = %identity.subject_id, role = %role, "role not permitted");
            return Err(AuthError::Forbidden);
        }

        Ok(identity.with_role(role))
    }

    /// Provider-only check (no cache read or write).
    pub async fn check_token(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        self.verify(token, &fingerprint(token)).await
    }

    pub async fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        let removed = self
            .store
            .delete_by_token(token)
            .await
            .map_err(|e| AuthError::internal(LOGOUT_FAULT, e))?;

        info!(token = %fingerprint(token), removed, "token invalidated");
        Ok(removed)
    }

    pub async fn revoke_all(&self, subject_id: &str) -> Result<u64, AuthError> {
        let removed = self
            .store
            .delete_all_by_subject(subject_id)
            .await
            .map_err(|e| AuthError::internal(LOGOUT_FAULT, e))?;

        info!(uid = %subject_id, removed, "all tokens invalidated");
        Ok(removed)
    }

    pub async fn set_role(&self, subject_id: &str, role: &str) -> Result<(), AuthError> {
        self.verifier
            .set_role(subject_id, role)
            .await
            .map_err(|e| AuthError::internal(SET_ROLE_FAULT, e))?;

        info!(uid = %subject_id, role = %role, "role updated");
        Ok(())
    }

    async fn verify(&self, token: &str, fp: &str) -> Result<VerifiedToken, AuthError> {
        match self.verifier.verify(token).await {
            Ok(verified) => Ok(verified),
            Err(VerifierError::InvalidToken(reason)) => {
                warn!(token = %fp, reason = %reason, "token verification failed");
                Err(AuthError::invalid_token())
            }
            Err(e) => Err(AuthError::internal(AUTHENTICATION_FAULT, e)),
        }
    }
}

/// Short, non-reversible token id for logs.
fn fingerprint(token: &str) -> String {
    Sha256::digest(token.as_bytes())[..6]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
