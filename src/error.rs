use crate::store::StoreError;
use ntex::http::StatusCode;
use ntex::web::{HttpResponse, WebResponseError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    Burst,
    Daily,
}

impl fmt::Display for RateLimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitKind::Burst => write!(f, "Too many submissions. Please wait a moment."),
            RateLimitKind::Daily => {
                write!(f, "Daily submission limit reached. Try again tomorrow.")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    RateLimited(RateLimitKind),
    #[error("Missing request body")]
    MissingBody,
    #[error("Invalid {0}")]
    InvalidField(&'static str),
    #[error("Invalid victory claim")]
    InvalidVictoryClaim,
    #[error("Invalid checksum")]
    ChecksumMismatch,
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::MissingBody
            | AppError::InvalidField(_)
            | AppError::InvalidVictoryClaim
            | AppError::ChecksumMismatch => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON body sent to the caller. Server-side failures never carry detail.
    pub fn body(&self) -> serde_json::Value {
        let message = if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        serde_json::json!({ "error": message })
    }
}

impl WebResponseError for AppError {
    fn error_response(&self, _: &ntex::web::HttpRequest) -> HttpResponse {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {}", self);
        }
        HttpResponse::build(status).json(&self.body())
    }
}
