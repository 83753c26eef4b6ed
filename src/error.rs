//! Error types for the purchases SDK

use thiserror::Error;

/// Error codes surfaced by SDK operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchasesErrorCode {
    /// Request never reached the backend, or the response was unreadable
    NetworkError,
    /// Caller supplied invalid input
    ValidationError,
    /// API key rejected by the backend
    InvalidApiKey,
    /// Backend refused the app user id
    InvalidAppUserId,
    /// Subscriber attributes were rejected
    InvalidSubscriberAttributes,
    /// Backend returned a 5xx
    ServerError,
    /// Too many requests
    RateLimited,
    /// Local storage could not be read or written
    StorageError,
    /// Anything the backend reported that we don't map
    Unknown,
}

impl std::fmt::Display for PurchasesErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::InvalidAppUserId => "INVALID_APP_USER_ID",
            Self::InvalidSubscriberAttributes => "INVALID_SUBSCRIBER_ATTRIBUTES",
            Self::ServerError => "SERVER_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::StorageError => "STORAGE_ERROR",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Error returned by SDK operations.
///
/// Backend failures carry the HTTP status they were derived from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct PurchasesError {
    pub code: PurchasesErrorCode,
    pub message: String,
    pub status_code: Option<u16>,
}

impl PurchasesError {
    pub fn new(code: PurchasesErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(code: PurchasesErrorCode, message: impl Into<String>, status: u16) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: Some(status),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PurchasesErrorCode::NetworkError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(PurchasesErrorCode::ValidationError, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(PurchasesErrorCode::StorageError, message)
    }
}

pub type Result<T> = std::result::Result<T, PurchasesError>;

/// Map an HTTP status (and the backend's message) to an error code.
pub fn map_status_to_error_code(status: u16, message: &str) -> PurchasesErrorCode {
    match status {
        401 | 403 => PurchasesErrorCode::InvalidApiKey,
        429 => PurchasesErrorCode::RateLimited,
        400 | 422 => {
            let lower = message.to_lowercase();
            if lower.contains("attribute") {
                PurchasesErrorCode::InvalidSubscriberAttributes
            } else if lower.contains("app_user_id") || lower.contains("app user id") {
                PurchasesErrorCode::InvalidAppUserId
            } else {
                PurchasesErrorCode::ValidationError
            }
        }
        500..=599 => PurchasesErrorCode::ServerError,
        _ => PurchasesErrorCode::Unknown,
    }
}
