//! Access-control error model.

use thiserror::Error;

/// Result type used across the access-control crates.
pub type AccessResult<T> = Result<T, AccessError>;

/// Access-control error.
///
/// Every resolver and administration failure is reported through one of these
/// variants. Callers decide how to surface them; the permission cache
/// additionally fails closed on any error returned by a resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No valid session; permissions cannot be resolved.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Authenticated, but lacking the privilege required for the call.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Malformed input (unknown role, empty token list, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Network/backend failure, or a response that could not be decoded.
    #[error("transport error: {0}")]
    Transport(String),
}

impl AccessError {
    pub fn denied(msg: impl Into<String>) -> Self {
        Self::AuthorizationDenied(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Whether this error came from the session layer rather than the call itself.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Stable machine-readable code (useful for toasts and CLI output).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::AuthorizationDenied(_) => "authorization_denied",
            Self::Validation(_) => "validation_error",
            Self::Transport(_) => "transport_error",
        }
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(value: serde_json::Error) -> Self {
        Self::Transport(format!("invalid payload: {value}"))
    }
}
