/// Factory: build the token store, identity provider and `Authenticator` from `Config`.
use std::sync::{Arc, OnceLock};

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::{Config, FirebaseConfig, TokenStoreBackend};
use crate::repos::token_repo::PgTokenRepo;
use crate::services::auth::Authenticator;
use crate::services::cache::CacheError;
use crate::services::identity::firebase::FirebaseInitError;
use crate::services::identity::{FirebaseIdentity, IdentityVerifier};
use crate::services::token_store::{MemoryTokenStore, TokenStore, ValkeyTokenStore};

const PG_MAX_CONNECTIONS: u32 = 10;

// The provider client is process-wide: initialized once, then handed out via AppState.
static IDENTITY_PROVIDER: OnceLock<Arc<FirebaseIdentity>> = OnceLock::new();

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("valkey: {0}")]
    Cache(#[from] CacheError),
    #[error("identity provider: {0}")]
    Provider(#[from] FirebaseInitError),
}

pub async fn build_token_store(config: &Config) -> Result<Arc<dyn TokenStore>, StartupError> {
    let store: Arc<dyn TokenStore> = match &config.token_store {
        TokenStoreBackend::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(PG_MAX_CONNECTIONS)
                .connect(database_url)
                .await?;
            let repo = PgTokenRepo::new(pool);
            repo.migrate().await?;
            Arc::new(repo)
        }
        TokenStoreBackend::Valkey { url } => Arc::new(ValkeyTokenStore::new(url).await?),
        TokenStoreBackend::Memory => {
            if config.app_env.is_production() {
                tracing::warn!("memory token store in production: cache is per-process");
            }
            Arc::new(MemoryTokenStore::new())
        }
    };

    tracing::info!(backend = store.backend_name(), "token store ready");
    Ok(store)
}

/// Initialize the identity provider client once per process.
pub fn build_identity_provider(
    config: &FirebaseConfig,
) -> Result<Arc<dyn IdentityVerifier>, StartupError> {
    if let Some(provider) = IDENTITY_PROVIDER.get() {
        let provider: Arc<dyn IdentityVerifier> = provider.clone();
        return Ok(provider);
    }

    let provider = FirebaseIdentity::from_config(config)?;
    tracing::info!(project_id = provider.project_id(), "identity provider initialized");

    let provider: Arc<dyn IdentityVerifier> =
        IDENTITY_PROVIDER.get_or_init(|| Arc::new(provider)).clone();
    Ok(provider)
}

pub fn build_authenticator(
    store: Arc<dyn TokenStore>,
    verifier: Arc<dyn IdentityVerifier>,
) -> Arc<Authenticator> {
    Arc::new(Authenticator::new(store, verifier))
}
