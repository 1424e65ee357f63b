//! Error types for the EIP reconciler
//!
//! Every remote call returns its own [`Result`]; callers decide at the call
//! site whether a failure is fatal, retried, or logged and skipped.

use thiserror::Error;

/// Result type alias for reconciler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the EIP reconciler
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-specific error without a structured API payload
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Structured rejection returned by the remote API
    #[error("API error {code}: {message} (request id: {request_id})")]
    Api {
        /// Remote error code, e.g. `InvalidInstanceId.NotFound`
        code: String,
        /// Human-readable message from the service
        message: String,
        /// Request id for support tickets
        request_id: String,
        /// HTTP status the error arrived with
        status: u16,
    },

    /// Transport-level HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A retried operation failed on every attempt
    #[error("{operation} failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        /// Operation label used in logs
        operation: String,
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        last: Box<Error>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a structured API error
    pub fn api(
        code: impl Into<String>,
        message: impl Into<String>,
        request_id: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
            request_id: request_id.into(),
            status,
        }
    }

    /// Whether the failure is likely to clear up on its own
    ///
    /// Used for log severity only; the retry policy does not consult it.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited(_) => true,
            Error::Api { code, status, .. } => {
                *status >= 500
                    || code.starts_with("Throttling")
                    || code.starts_with("ServiceUnavailable")
                    || code.starts_with("IncorrectInstanceStatus")
                    || code.starts_with("IncorrectEipStatus")
                    || code.contains("TaskConflict")
            }
            Error::RetriesExhausted { last, .. } => last.is_transient(),
            _ => false,
        }
    }
}
