use std::fmt::Display;

use thiserror::Error;

pub const NO_TOKEN_MESSAGE: &str = "Access denied. No token provided or invalid format.";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token. Authentication failed.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("insufficient permissions")]
    Forbidden,

    /// Store or provider fault. `context` is safe to show to clients, `detail` is not.
    #[error("{context}: {detail}")]
    Internal {
        context: &'static str,
        detail: String,
    },
}

impl AuthError {
    pub fn no_token() -> Self {
        Self::Unauthenticated(NO_TOKEN_MESSAGE)
    }

    pub fn invalid_token() -> Self {
        Self::Unauthenticated(INVALID_TOKEN_MESSAGE)
    }

    /// Log the fault and wrap it.
    pub fn internal(context: &'static str, err: impl Display) -> Self {
        let detail = err.to_string();
        tracing::error!(error = %detail, "{context}");
        Self::Internal { context, detail }
    }
}
