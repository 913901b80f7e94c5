use thiserror::Error;

use crate::context::Cancelled;

/// Failures raised by a `CredentialStore`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
    #[error("store call cancelled")]
    Cancelled,
}

impl From<Cancelled> for StoreError {
    fn from(_: Cancelled) -> Self {
        StoreError::Cancelled
    }
}

/// Business errors for account workflows
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("username already exists")]
    DuplicateUsername,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("hashing error: {0}")]
    Hashing(String),
    #[error("token error: {0}")]
    Token(String),
}

impl AccountError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AccountError::Validation(_) => 1001,
            AccountError::DuplicateUsername => 1002,
            AccountError::InvalidCredentials => 1004,
            AccountError::Cancelled => 1005,
            AccountError::Hashing(_) => 1101,
            AccountError::Token(_) => 1102,
            AccountError::StoreUnavailable(_) => 1200,
        }
    }

    /// Wire-level error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountError::Validation(_) => "VALIDATION_ERROR",
            AccountError::DuplicateUsername => "DUPLICATE_USERNAME",
            AccountError::InvalidCredentials => "INVALID_CREDENTIALS",
            AccountError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AccountError::Cancelled => "CANCELLED",
            AccountError::Hashing(_) | AccountError::Token(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AccountError::StoreUnavailable(_))
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AccountError::DuplicateUsername,
            StoreError::Unavailable(msg) => AccountError::StoreUnavailable(msg),
            StoreError::Cancelled => AccountError::Cancelled,
        }
    }
}

impl From<Cancelled> for AccountError {
    fn from(_: Cancelled) -> Self {
        AccountError::Cancelled
    }
}
