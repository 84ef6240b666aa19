use async_trait::async_trait;
use thiserror::Error;

/// What the provider vouches for after a successful `verify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject_id: String,
    pub subject_name: String,
    /// `exp` claim (unix seconds).
    pub expires_at_epoch_seconds: i64,
    /// Custom `role` claim, when the provider carries one.
    pub role: Option<String>,
}

#[derive(Debug, Error)]
pub enum VerifierError {
    /// Expired, malformed, bad signature, wrong issuer/audience, revoked.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("subject not found")]
    NotFound,

    /// Provider could not be reached or answered unexpectedly.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Narrow contract the auth middleware and role gate need from the provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifierError>;

    /// Current role of the subject (live, not from any token).
    async fn get_role(&self, subject_id: &str) -> Result<String, VerifierError>;

    async fn set_role(&self, subject_id: &str, role: &str) -> Result<(), VerifierError>;
}
