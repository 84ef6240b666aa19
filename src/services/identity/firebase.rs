//! Firebase Authentication as the identity provider.
//!
//! - `verify`: ID token (RS256 JWT) checked against Google's securetoken keys,
//!   issuer `https://securetoken.google.com/<project>`, audience `<project>`.
//! - `get_role` / `set_role`: Identity Toolkit admin API, `role` kept in the
//!   user's custom claims (`customAttributes`, a JSON string).

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;
use serde_json::json;

use super::jwks::JwksCache;
use super::service_account::{AccessTokenSource, CredentialsError, ServiceAccount};
use super::verifier::{IdentityVerifier, VerifiedToken, VerifierError};
use crate::config::FirebaseConfig;
use crate::services::token_store::DEFAULT_ROLE;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum FirebaseInitError {
    #[error("FIREBASE_PROJECT_ID is not set and the credentials carry no project_id")]
    MissingProjectId,
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    exp: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    #[serde(rename = "customAttributes", default)]
    custom_attributes: Option<String>,
}

struct AdminApi {
    accounts_url: String,
    tokens: AccessTokenSource,
    client: reqwest::Client,
}

pub struct FirebaseIdentity {
    project_id: String,
    validation: Validation,
    jwks: JwksCache,
    admin: Option<AdminApi>,
}

impl std::fmt::Debug for FirebaseIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("FirebaseIdentity")
            .field("project_id", &self.project_id)
            .field("admin_api", &self.admin.is_some())
            .finish()
    }
}

impl FirebaseIdentity {
    pub fn from_config(config: &FirebaseConfig) -> Result<Self, FirebaseInitError> {
        let account = ServiceAccount::load(&config.credentials)?;

        let project_id = config
            .project_id
            .clone()
            .or_else(|| account.as_ref().and_then(|a| a.project_id.clone()))
            .ok_or(FirebaseInitError::MissingProjectId)?;

        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let admin = match account {
            Some(account) => Some(AdminApi {
                accounts_url: format!(
                    "{}/projects/{}/accounts",
                    config.identity_toolkit_url.as_str().trim_end_matches('/'),
                    project_id
                ),
                tokens: AccessTokenSource::new(
                    &account,
                    config.oauth_token_url.as_str(),
                    client.clone(),
                )?,
                client: client.clone(),
            }),
            None => {
                tracing::warn!("no service account configured; role lookups will fail");
                None
            }
        };

        let jwks = JwksCache::new(config.jwks_url.as_str(), client);

        Ok(Self::new(project_id, jwks, config.leeway_seconds, admin))
    }

    fn new(
        project_id: String,
        jwks: JwksCache,
        leeway_seconds: u64,
        admin: Option<AdminApi>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("https://securetoken.google.com/{project_id}")]);
        validation.set_audience(&[&project_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = leeway_seconds;

        Self {
            project_id,
            validation,
            jwks,
            admin,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn admin(&self) -> Result<&AdminApi, VerifierError> {
        self.admin.as_ref().ok_or_else(|| {
            VerifierError::Unavailable("no service account configured for admin API".to_string())
        })
    }
}

impl AdminApi {
    async fn call(
        &self,
        action: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, VerifierError> {
        let access_token = self.tokens.access_token().await?;

        self.client
            .post(format!("{}:{}", self.accounts_url, action))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| VerifierError::Unavailable(format!("accounts:{action}: {e}")))
    }
}

/// Role carried by a user's custom claims JSON; `"user"` when unset.
fn role_from_custom_attributes(raw: Option<&str>) -> Result<String, VerifierError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(DEFAULT_ROLE.to_string());
    };

    let claims: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| VerifierError::Unavailable(format!("malformed custom claims: {e}")))?;

    Ok(claims
        .get("role")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_ROLE)
        .to_string())
}

#[async_trait]
impl IdentityVerifier for FirebaseIdentity {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifierError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| VerifierError::InvalidToken(e.to_string()))?;

        let kid = header
            .kid
            .ok_or_else(|| VerifierError::InvalidToken("missing kid header".to_string()))?;

        let key = self.jwks.decoding_key(&kid).await?;

        let claims = jsonwebtoken::decode::<IdTokenClaims>(token, &key, &self.validation)
            .map_err(|e| VerifierError::InvalidToken(e.to_string()))?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(VerifierError::InvalidToken("empty 'sub' claim".to_string()));
        }

        Ok(VerifiedToken {
            subject_id: claims.sub,
            subject_name: claims.name.or(claims.email).unwrap_or_default(),
            expires_at_epoch_seconds: claims.exp,
            role: claims.role,
        })
    }

    async fn get_role(&self, subject_id: &str) -> Result<String, VerifierError> {
        let admin = self.admin()?;
        let response = admin
            .call("lookup", json!({ "localId": [subject_id] }))
            .await?;

        if !response.status().is_success() {
            return Err(VerifierError::Unavailable(format!(
                "accounts:lookup: HTTP {}",
                response.status()
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| VerifierError::Unavailable(format!("accounts:lookup decode: {e}")))?;

        let user = body.users.into_iter().next().ok_or(VerifierError::NotFound)?;
        role_from_custom_attributes(user.custom_attributes.as_deref())
    }

    async fn set_role(&self, subject_id: &str, role: &str) -> Result<(), VerifierError> {
        let admin = self.admin()?;
        let custom_attributes = json!({ "role": role }).to_string();

        let response = admin
            .call(
                "update",
                json!({ "localId": subject_id, "customAttributes": custom_attributes }),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if body.contains("USER_NOT_FOUND") {
            return Err(VerifierError::NotFound);
        }

        Err(VerifierError::Unavailable(format!(
            "accounts:update: HTTP {status}"
        )))
    }
}
