//! Signing-key set (JWKS) fetching and caching for ID token verification.
//!
//! Keys are cached for `cache_ttl`. An unknown `kid` may force an early
//! refetch so provider key rotation is picked up, but never more often than
//! `min_refresh_interval`; refetches are single-flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use tokio::sync::{Mutex, RwLock};

use super::verifier::VerifierError;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Default)]
struct CacheState {
    jwks: Option<JwkSet>,
    fetched_at: Option<Instant>,
    // Last fetch attempt, successful or not.
    attempted_at: Option<Instant>,
}

impl CacheState {
    fn key(&self, kid: &str) -> Option<Jwk> {
        self.jwks.as_ref().and_then(|jwks| find(jwks, kid)).cloned()
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < ttl)
    }

    fn recently_attempted(&self, interval: Duration) -> bool {
        self.attempted_at.is_some_and(|at| at.elapsed() < interval)
    }
}

enum Cached {
    Hit(Jwk),
    // Key unknown and a refetch would be too soon.
    Unknown,
    // No key set yet and the last attempt failed recently.
    Unavailable,
    Refetch,
}

impl Cached {
    fn resolve(self, kid: &str) -> Option<Result<DecodingKey, VerifierError>> {
        match self {
            Cached::Hit(jwk) => Some(jwk_to_decoding_key(&jwk)),
            Cached::Unknown => Some(Err(unknown_key(kid))),
            Cached::Unavailable => Some(Err(VerifierError::Unavailable(
                "signing keys not loaded".to_string(),
            ))),
            Cached::Refetch => None,
        }
    }
}

#[derive(Clone)]
pub struct JwksCache {
    jwks_url: String,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    cache: Arc<RwLock<CacheState>>,
    refresh_lock: Arc<Mutex<()>>,
    client: reqwest::Client,
}

impl JwksCache {
    pub fn new(jwks_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            cache: Arc::new(RwLock::new(CacheState::default())),
            refresh_lock: Arc::new(Mutex::new(())),
            client,
        }
    }

    #[cfg(test)]
    pub fn with_keys(jwks: JwkSet) -> Self {
        let cache = Self::new("http://127.0.0.1:9/unused", reqwest::Client::new());
        {
            let mut state = cache.cache.try_write().expect("fresh lock");
            state.jwks = Some(jwks);
            state.fetched_at = Some(Instant::now());
            state.attempted_at = Some(Instant::now());
        }
        cache
    }

    /// RSA decoding key for `kid`.
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, VerifierError> {
        if let Some(result) = self.cached(kid).await.resolve(kid) {
            return result;
        }

        let _guard = self.refresh_lock.lock().await;

        // Another request may have refreshed while we waited.
        if let Some(result) = self.cached(kid).await.resolve(kid) {
            return result;
        }

        match self.refresh().await {
            Ok(jwks) => {
                let jwk = find(&jwks, kid).ok_or_else(|| unknown_key(kid))?;
                jwk_to_decoding_key(jwk)
            }
            Err(err) => {
                let cache = self.cache.read().await;
                if cache.jwks.is_none() {
                    return Err(err);
                }
                // Keep serving the last good key set while the provider is down.
                tracing::warn!(error = %err, "jwks refresh failed; using cached keys");
                let jwk = cache.key(kid).ok_or_else(|| unknown_key(kid))?;
                jwk_to_decoding_key(&jwk)
            }
        }
    }

    async fn cached(&self, kid: &str) -> Cached {
        let cache = self.cache.read().await;

        match cache.key(kid) {
            Some(jwk) if cache.is_fresh(self.cache_ttl) => Cached::Hit(jwk),
            key if cache.recently_attempted(self.min_refresh_interval) => match key {
                Some(jwk) => Cached::Hit(jwk),
                None if cache.jwks.is_none() => Cached::Unavailable,
                None => Cached::Unknown,
            },
            _ => Cached::Refetch,
        }
    }

    async fn refresh(&self) -> Result<JwkSet, VerifierError> {
        self.cache.write().await.attempted_at = Some(Instant::now());

        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| VerifierError::Unavailable(format!("jwks fetch: {e}")))?;

        if !response.status().is_success() {
            return Err(VerifierError::Unavailable(format!(
                "jwks fetch: HTTP {}",
                response.status()
            )));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| VerifierError::Unavailable(format!("jwks decode: {e}")))?;

        tracing::debug!(keys = jwks.keys.len(), "refreshed signing keys");

        let mut cache = self.cache.write().await;
        cache.jwks = Some(jwks.clone());
        cache.fetched_at = Some(Instant::now());

        Ok(jwks)
    }
}

fn unknown_key(kid: &str) -> VerifierError {
    VerifierError::InvalidToken(format!("unknown signing key: {kid}"))
}

fn find<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid))
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, VerifierError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| VerifierError::Unavailable(format!("bad RSA key in jwks: {e}"))),
        _ => Err(VerifierError::Unavailable(
            "unsupported key type in jwks".to_string(),
        )),
    }
}
