/*
 * Responsibility
 * - 環境変数や設定の読み込み (PORT, CORS, token store backend, Firebase 認証情報など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

pub const DEFAULT_FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
pub const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where verified tokens are cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStoreBackend {
    Postgres { database_url: String },
    Valkey { url: String },
    Memory,
}

/// Service-account credentials used for the provider's admin API (role lookups/updates).
#[derive(Clone, PartialEq, Eq)]
pub enum ServiceAccountSource {
    Inline {
        client_email: String,
        private_key_pem: String,
    },
    File(PathBuf),
    /// Token verification only; role lookups will fail.
    None,
}

impl fmt::Debug for ServiceAccountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        match self {
            Self::Inline { client_email, .. } => f
                .debug_struct("Inline")
                .field("client_email", client_email)
                .finish_non_exhaustive(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::None => f.write_str("None"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub project_id: Option<String>,
    pub credentials: ServiceAccountSource,
    pub leeway_seconds: u64,
    pub jwks_url: Url,
    pub identity_toolkit_url: Url,
    pub oauth_token_url: Url,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub request_timeout_seconds: u64,
    pub request_body_limit_bytes: usize,

    pub token_store: TokenStoreBackend,
    pub token_sweep_interval_seconds: u64,

    pub firebase: FirebaseConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = lookup("PORT").and_then(|s| s.parse().ok()).unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let request_timeout_seconds = parse_or(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?;
        let request_body_limit_bytes = parse_or(&lookup, "REQUEST_BODY_LIMIT_BYTES", 1024 * 1024)?;

        let token_store = match lookup("TOKEN_STORE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" | "pg" => TokenStoreBackend::Postgres {
                database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            "valkey" | "redis" => TokenStoreBackend::Valkey {
                url: lookup("VALKEY_URL").ok_or(ConfigError::Missing("VALKEY_URL"))?,
            },
            "memory" => TokenStoreBackend::Memory,
            _ => return Err(ConfigError::Invalid("TOKEN_STORE_BACKEND")),
        };

        let token_sweep_interval_seconds: u64 =
            parse_or(&lookup, "TOKEN_SWEEP_INTERVAL_SECONDS", 60)?;
        if token_sweep_interval_seconds == 0 {
            return Err(ConfigError::Invalid("TOKEN_SWEEP_INTERVAL_SECONDS"));
        }

        let firebase = FirebaseConfig::from_lookup(&lookup)?;

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            request_timeout_seconds,
            request_body_limit_bytes,
            token_store,
            token_sweep_interval_seconds,
            firebase,
        })
    }
}

impl FirebaseConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_id = lookup("FIREBASE_PROJECT_ID").filter(|s| !s.trim().is_empty());

        let credentials = match (
            lookup("FIREBASE_CLIENT_EMAIL"),
            lookup("FIREBASE_PRIVATE_KEY"),
            lookup("GOOGLE_APPLICATION_CREDENTIALS"),
        ) {
            (Some(client_email), Some(private_key), _) => ServiceAccountSource::Inline {
                client_email,
                private_key_pem: private_key.replace("\\n", "\n"),
            },
            (Some(_), None, _) => return Err(ConfigError::Missing("FIREBASE_PRIVATE_KEY")),
            (None, Some(_), _) => return Err(ConfigError::Missing("FIREBASE_CLIENT_EMAIL")),
            (None, None, Some(path)) => ServiceAccountSource::File(PathBuf::from(path)),
            (None, None, None) => ServiceAccountSource::None,
        };

        // The project id may come from the credentials file instead.
        if project_id.is_none() && !matches!(credentials, ServiceAccountSource::File(_)) {
            return Err(ConfigError::Missing("FIREBASE_PROJECT_ID"));
        }

        Ok(Self {
            project_id,
            credentials,
            leeway_seconds: parse_or(lookup, "AUTH_LEEWAY_SECONDS", 60)?,
            jwks_url: url_or(lookup, "FIREBASE_JWKS_URL", DEFAULT_FIREBASE_JWKS_URL)?,
            identity_toolkit_url: url_or(
                lookup,
                "IDENTITY_TOOLKIT_URL",
                DEFAULT_IDENTITY_TOOLKIT_URL,
            )?,
            oauth_token_url: url_or(lookup, "OAUTH_TOKEN_URL", DEFAULT_OAUTH_TOKEN_URL)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn url_or<F>(lookup: &F, key: &'static str, default: &str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|_| ConfigError::Invalid(key))
}
