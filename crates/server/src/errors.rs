use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use service::accounts::AccountError;
use thiserror::Error;
use tracing::{error, warn};

/// HTTP face of an [`AccountError`].
#[derive(Debug)]
pub struct ApiError(pub AccountError);

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AccountError::Validation(_) => StatusCode::BAD_REQUEST,
            AccountError::DuplicateUsername => StatusCode::CONFLICT,
            AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AccountError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AccountError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            AccountError::Hashing(_) | AccountError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.0.as_str();
        // Infrastructure details stay in the logs, not in the response.
        let msg = match &self.0 {
            AccountError::StoreUnavailable(detail) => {
                warn!(error = %detail, code = self.0.code(), "store unavailable");
                "credential store unavailable".to_string()
            }
            AccountError::Hashing(detail) | AccountError::Token(detail) => {
                error!(error = %detail, code = self.0.code(), "internal account error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": msg, "code": code }))).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("database unavailable: {0}")]
    Database(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
