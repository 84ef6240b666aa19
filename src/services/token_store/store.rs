use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::auth::AuthenticatedIdentity;

/// Role assigned when the provider does not supply one.
pub const DEFAULT_ROLE: &str = "user";

/// A bearer token that was verified once by the identity provider.
///
/// Field names on the wire / in the table follow the persisted record shape:
/// `{token, uid, uname, role, expiresAt, createdAt}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CachedToken {
    pub token: String,
    #[serde(rename = "uid")]
    #[sqlx(rename = "uid")]
    pub subject_id: String,
    #[serde(rename = "uname")]
    #[sqlx(rename = "uname")]
    pub subject_name: String,
    pub role: String,
    #[serde(rename = "expiresAt")]
    #[sqlx(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "createdAt")]
    #[sqlx(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn identity(&self) -> AuthenticatedIdentity {
        AuthenticatedIdentity::new(&self.subject_id, &self.subject_name, &self.role)
    }
}

pub type TokenStoreResult<T> = Result<T, TokenStoreError>;

#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// A live record with the same token already exists.
    #[error("token already cached")]
    Conflict,

    #[error("token store backend error: {0}")]
    Backend(String),
}

/// Keyed cache of verified tokens.
///
/// Contract shared by every backend:
/// - `lookup` never returns a record whose `expires_at` has passed, whether or
///   not it has been physically removed yet.
/// - `insert` fails with `Conflict` when a live record with the same token exists.
///   An expired record with the same token may be replaced.
/// - deletes are idempotent.
#[async_trait]
pub trait TokenStore: Send + Sync {
    // Backend name for logging.
    fn backend_name(&self) -> &'static str;

    async fn lookup(&self, token: &str) -> TokenStoreResult<Option<CachedToken>>;

    async fn insert(&self, record: CachedToken) -> TokenStoreResult<()>;

    // Returns whether a record was removed.
    async fn delete_by_token(&self, token: &str) -> TokenStoreResult<bool>;

    // Returns the number of records removed.
    async fn delete_all_by_subject(&self, subject_id: &str) -> TokenStoreResult<u64>;

    // Physically remove expired records. Returns the number removed.
    async fn purge_expired(&self) -> TokenStoreResult<u64>;
}
