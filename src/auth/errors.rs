//! # Auth Errors
//!
//! Every failure of the session subsystem is a typed variant. Token
//! decoding failures collapse into `InvalidToken` so callers cannot learn
//! which validation step rejected them.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Your account is not verified. Please verify your email to proceed.")]
    AccountUnverified,

    #[error("Email already in use")]
    EmailInUse,

    #[error("Invalid code")]
    InvalidCode,

    #[error("Code expired")]
    CodeExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid scope")]
    InvalidScope,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Refresh token already stored")]
    DuplicateToken,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// HTTP status equivalent of this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials => 401,
            AuthError::AccountUnverified => 403,
            AuthError::EmailInUse => 400,
            AuthError::InvalidCode => 400,
            AuthError::CodeExpired => 400,
            AuthError::InvalidToken => 401,
            AuthError::InvalidScope => 401,
            AuthError::TokenRevoked => 401,
            AuthError::InvalidRefreshToken => 401,
            AuthError::RefreshTokenExpired => 401,
            AuthError::DuplicateToken => 409,
            AuthError::NotFound(_) => 404,
            AuthError::Forbidden(_) => 403,
            AuthError::Validation(_) => 400,
            AuthError::Hashing(_) => 500,
            AuthError::Email(_) => 500,
            AuthError::Config(_) => 500,
            AuthError::Database(_) => 500,
            AuthError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::AccountUnverified => "ACCOUNT_UNVERIFIED",
            AuthError::EmailInUse => "EMAIL_IN_USE",
            AuthError::InvalidCode => "INVALID_CODE",
            AuthError::CodeExpired => "CODE_EXPIRED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::InvalidScope => "INVALID_SCOPE",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::RefreshTokenExpired => "REFRESH_TOKEN_EXPIRED",
            AuthError::DuplicateToken => "DUPLICATE_TOKEN",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::Hashing(_) => "HASHING_ERROR",
            AuthError::Email(_) => "EMAIL_ERROR",
            AuthError::Config(_) => "CONFIG_ERROR",
            AuthError::Database(_) => "DATABASE_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the store rejected a write because of a uniqueness constraint
    pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
        err.as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("background task failed: {}", e))
    }
}
