/*
 * Responsibility
 * - 認証 (cache-first な bearer token 検証) と認可 (role gate) のドメインロジック
 * - HTTP には依存しない。middleware / handler から Authenticator を呼ぶ
 */
pub mod authenticator;
pub mod error;
pub mod factory;
pub mod types;

pub use authenticator::Authenticator;
pub use error::AuthError;
pub use factory::{build_authenticator, build_identity_provider, build_token_store};
pub use types::AuthenticatedIdentity;
