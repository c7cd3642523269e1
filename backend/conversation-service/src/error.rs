use crate::middleware::error_handling;
use crate::models::QuotaDecision;
use crate::repository::StoreError;
use crate::services::quota_ledger::QuotaError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        error_handling::into_response(self)
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("quota exceeded for {feature}: {used} of {limit} used", used = .decision.used, limit = .decision.limit)]
    QuotaExceeded {
        feature: String,
        decision: QuotaDecision,
    },

    #[error("store unavailable: {0}")]
    TransientStore(String),

    #[error("internal server error")]
    Internal,
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => AppError::TransientStore(msg),
            StoreError::Corrupt(msg) => {
                tracing::error!(error = %msg, "corrupt record in store");
                AppError::Internal
            }
        }
    }
}

impl From<QuotaError> for AppError {
    fn from(e: QuotaError) -> Self {
        AppError::TransientStore(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl AppError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientStore(_))
    }

    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden | AppError::QuotaExceeded { .. } => 403,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::TransientStore(_) => 503,
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_retryable_transient() {
        let err: AppError = StoreError::Unavailable("pool timed out".into()).into();
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 503);

        let err: AppError = StoreError::Corrupt("bad payload".into()).into();
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn quota_exceeded_is_forbidden() {
        let err = AppError::QuotaExceeded {
            feature: "message_sent".into(),
            decision: QuotaDecision::new(false, 5, 5, None),
        };
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.to_string(), "quota exceeded for message_sent: 5 of 5 used");
    }
}
