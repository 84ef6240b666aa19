pub mod auth_ctx;
pub mod json;

pub use auth_ctx::{AuthIdentity, BearerToken};
pub use json::ApiJson;
