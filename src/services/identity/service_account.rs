//! Service-account credentials and the OAuth2 access token used for the
//! provider's admin API (role lookups and updates).
//!
//! Flow (JWT bearer grant):
//! 1. Sign an RS256 assertion with the service-account private key.
//! 2. Exchange it at the token endpoint for a short-lived access token.
//! 3. Reuse that token until shortly before it expires.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::verifier::VerifierError;
use crate::config::ServiceAccountSource;

const ADMIN_SCOPE: &str = "https://www.googleapis.com/auth/identitytoolkit";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Refresh this long before the provider's expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    #[serde(rename = "private_key")]
    pub private_key_pem: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("read service account file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parse service account file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid service account private key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
}

impl ServiceAccount {
    /// Resolve credentials from config; `Ok(None)` means verification-only mode.
    pub fn load(source: &ServiceAccountSource) -> Result<Option<Self>, CredentialsError> {
        match source {
            ServiceAccountSource::Inline {
                client_email,
                private_key_pem,
            } => Ok(Some(Self {
                client_email: client_email.clone(),
                private_key_pem: private_key_pem.clone(),
                project_id: None,
            })),
            ServiceAccountSource::File(path) => Self::from_file(path).map(Some),
            ServiceAccountSource::None => Ok(None),
        }
    }

    fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedAccessToken {
    value: String,
    refresh_at: Instant,
}

/// Hands out a valid admin access token, exchanging a new assertion when needed.
#[derive(Clone)]
pub struct AccessTokenSource {
    client_email: String,
    encoding_key: EncodingKey,
    token_url: String,
    client: reqwest::Client,
    cached: Arc<RwLock<Option<CachedAccessToken>>>,
}

impl AccessTokenSource {
    pub fn new(
        account: &ServiceAccount,
        token_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Result<Self, CredentialsError> {
        let encoding_key = EncodingKey::from_rsa_pem(account.private_key_pem.as_bytes())?;

        Ok(Self {
            client_email: account.client_email.clone(),
            encoding_key,
            token_url: token_url.into(),
            client,
            cached: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn access_token(&self) -> Result<String, VerifierError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref()
                && Instant::now() < token.refresh_at
            {
                return Ok(token.value.clone());
            }
        }

        let response = self.exchange().await?;
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);

        let mut cached = self.cached.write().await;
        *cached = Some(CachedAccessToken {
            value: response.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(response.access_token)
    }

    fn assertion(&self) -> Result<String, VerifierError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: ADMIN_SCOPE,
            aud: &self.token_url,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| VerifierError::Unavailable(format!("sign assertion: {e}")))
    }

    async fn exchange(&self) -> Result<TokenResponse, VerifierError> {
        let assertion = self.assertion()?;

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| VerifierError::Unavailable(format!("token exchange: {e}")))?;

        if !response.status().is_success() {
            return Err(VerifierError::Unavailable(format!(
                "token exchange: HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| VerifierError::Unavailable(format!("token exchange decode: {e}")))
    }
}
