use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Failures raised by ledger mutations and schedule generation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid input: {field} ({reason})")]
    InvalidInput { field: String, reason: String },

    #[error("Unknown deal: {0}")]
    UnknownDeal(String),

    #[error("Invalid term: {0} (must be at least one day)")]
    InvalidTerm(u32),
}

impl LedgerError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidInput {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Ledger(LedgerError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            AppError::Ledger(LedgerError::InvalidTerm(_)) => StatusCode::BAD_REQUEST,
            AppError::Ledger(LedgerError::UnknownDeal(_)) => StatusCode::NOT_FOUND,
            AppError::TemplateError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

impl From<AppError> for std::io::Error {
    fn from(err: AppError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
    }
}
