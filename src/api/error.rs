//! Structured failures surfaced by the StockChat client

use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a failure, for callers that only need to know
/// how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The requested resource does not exist; retrying will not help
    NotFound,
    /// Server-side or timing failure that may succeed later
    Transient,
    /// The request itself was rejected
    Client,
    /// The service could not be reached
    Network,
}

/// Errors that can occur when talking to the analysis service
///
/// `Clone` so a single outcome can be handed to every caller waiting on the
/// same in-flight request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Connection-level failure, no response received
    #[error("Network error: {message}")]
    Network { message: String },

    /// No response within the configured deadline
    #[error("Request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    /// Non-2xx HTTP response
    #[error("{message}")]
    Status { status: u16, message: String },

    /// A 2xx response whose body is not a valid envelope
    #[error("Failed to parse API response: {message}")]
    Decode { message: String },

    /// Rejected locally before any network I/O
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The task running the request ended without producing an outcome
    #[error("Request aborted: {message}")]
    Aborted { message: String },

    /// Every attempt failed; `last` is the final underlying error
    #[error("Request failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<ApiError> },
}

impl ApiError {
    /// Builds a status error with the standard message
    pub fn status(status: u16) -> Self {
        ApiError::Status {
            status,
            message: format!("HTTP error! status: {}", status),
        }
    }

    /// HTTP status code, when the failure came from an HTTP response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Exhausted { last, .. } => last.status_code(),
            _ => None,
        }
    }

    /// Whether the service reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Whether another attempt could plausibly succeed
    ///
    /// A 404 is authoritative and local validation failures never change, so
    /// neither is retried. Everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status != 404,
            ApiError::InvalidRequest { .. } => false,
            ApiError::Exhausted { .. } => false,
            _ => true,
        }
    }

    /// The innermost error, unwrapping retry exhaustion
    pub fn root(&self) -> &ApiError {
        match self {
            ApiError::Exhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// Classifies the failure for user-facing handling
    pub fn class(&self) -> ErrorClass {
        match self.root() {
            ApiError::Status { status: 404, .. } => ErrorClass::NotFound,
            ApiError::Status { status, .. } if *status >= 500 => ErrorClass::Transient,
            ApiError::Status { .. } | ApiError::InvalidRequest { .. } => ErrorClass::Client,
            ApiError::Timeout { .. } | ApiError::Decode { .. } | ApiError::Aborted { .. } => {
                ErrorClass::Transient
            }
            ApiError::Network { .. } => ErrorClass::Network,
            ApiError::Exhausted { .. } => ErrorClass::Transient,
        }
    }
}
