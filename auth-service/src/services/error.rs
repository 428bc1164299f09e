use service_core::error::AppError;
use thiserror::Error;

/// Failures of the token engine.
///
/// Every variant up to `Timeout` is a client-side authentication failure and
/// is reported to callers as the same uniform 401.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Malformed token")]
    MalformedToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    TokenExpired,

    #[error("Wrong token kind")]
    WrongTokenKind,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Operation timed out")]
    Timeout,

    #[error("Store error: {0}")]
    Store(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Short stable label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::UnknownRole(_) => "unknown_role",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::WrongTokenKind => "wrong_token_kind",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::Timeout => "timeout",
            AuthError::Store(_) => "store_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn is_authentication_failure(&self) -> bool {
        !matches!(self, AuthError::Store(_) | AuthError::Internal(_))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(e) => {
                tracing::error!(error = %e, "Backing store unavailable");
                AppError::ServiceUnavailable
            }
            AuthError::Internal(e) => AppError::InternalError(e),
            _ => AppError::Unauthorized(anyhow::anyhow!("Authentication failed")),
        }
    }
}
