//! Upstream call failures.
//!
//! Every failure talking to an upstream (identity provider, token endpoint)
//! is classified as transient or not, so the retry policy can decide whether
//! another attempt is worth making.

use thiserror::Error;

/// Failure of one call to an upstream HTTP service.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Transport failed before a response was received
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream {url} returned status {status}")]
    Status {
        /// HTTP status code returned by the upstream
        status: u16,
        /// URL that was requested
        url: String,
    },

    /// Upstream answered with a body that is not the expected document
    #[error("Upstream {url} returned a malformed document: {source}")]
    Decode {
        /// URL that was requested
        url: String,
        /// Parse failure
        source: serde_json::Error,
    },
}

impl PlatformError {
    /// Whether another attempt may succeed.
    ///
    /// Connect failures, timeouts, 5xx and 429 responses are transient;
    /// other statuses and malformed documents are not.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_common::PlatformError;
    ///
    /// assert!(PlatformError::from_status(503, "https://idp.example.com").is_retryable());
    /// assert!(PlatformError::from_status(429, "https://idp.example.com").is_retryable());
    /// assert!(!PlatformError::from_status(404, "https://idp.example.com").is_retryable());
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode { .. } => false,
        }
    }

    /// Error for a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, url: impl Into<String>) -> Self {
        Self::Status {
            status,
            url: url.into(),
        }
    }

    /// Error for a body that failed to parse.
    #[must_use]
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }
}
