//! Error handling module with type-safe, non-exhaustive error types
//!
//! This module provides a unified error handling approach with:
//! - Non-exhaustive enums for forward compatibility
//! - A fail-closed mapping: bad tokens and key-infrastructure failures both
//!   render as 401, but carry distinct codes for operators
//! - Sanitization of sensitive information in responses

use rust_common::PlatformError;
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;

/// Sensitive patterns that should be sanitized from error messages
const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "secret",
    "token",
    "key",
    "credential",
    "bearer",
    "authorization",
    "api_key",
    "apikey",
    "private",
    "jwt",
];

/// Non-exhaustive error enum for forward compatibility
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EdgeAuthError {
    /// Missing, malformed, expired or otherwise unacceptable credential
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// Operator-facing description, never sent to clients
        reason: String,
    },

    /// Verification keys could not be fetched, parsed or found
    #[error("Key infrastructure failure: {reason}")]
    InternalServiceError {
        /// Operator-facing description, never sent to clients
        reason: String,
    },

    /// The trigger event does not have the expected structure
    #[error("Malformed trigger event: {reason}")]
    EventShape {
        /// What was missing or malformed
        reason: String,
    },

    /// The downstream handler failed
    #[error("Handler failed: {0}")]
    Handler(#[from] HandlerError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal error (details sanitized in responses)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Error codes for responses and log correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unauthorized,
    KeyInfrastructure,
    EventShape,
    HandlerFailed,
    ConfigInvalid,
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "AUTH_UNAUTHORIZED",
            Self::KeyInfrastructure => "AUTH_KEY_INFRASTRUCTURE",
            Self::EventShape => "EVENT_SHAPE_INVALID",
            Self::HandlerFailed => "HANDLER_FAILED",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// HTTP status a client sees for this error.
    ///
    /// Key infrastructure failures deliberately share 401 with bad tokens.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized | Self::KeyInfrastructure => 401,
            Self::EventShape | Self::HandlerFailed | Self::ConfigInvalid | Self::Internal => 500,
        }
    }
}

/// Structured error response with correlation ID
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message (sanitized)
    pub message: String,
    /// Correlation ID for tracing
    pub correlation_id: Uuid,
}

impl ErrorResponse {
    /// Create a new error response from an [`EdgeAuthError`]
    #[must_use]
    pub fn from_error(error: &EdgeAuthError, correlation_id: Uuid) -> Self {
        let code = error.code();
        let message = match error {
            // Identical on purpose: a client cannot tell a bad token from a key outage
            EdgeAuthError::Unauthorized { .. } | EdgeAuthError::InternalServiceError { .. } => {
                "Unauthorized".to_string()
            }
            EdgeAuthError::Handler(err) => sanitize_message(&err.message),
            EdgeAuthError::EventShape { .. }
            | EdgeAuthError::Config(_)
            | EdgeAuthError::Internal(_) => "Unexpected error".to_string(),
        };

        Self {
            code,
            message,
            correlation_id,
        }
    }

    /// Client-facing JSON body.
    #[must_use]
    pub fn to_body(&self) -> Value {
        json!({
            "title": self.message,
            "errorId": self.correlation_id.to_string(),
        })
    }
}

impl EdgeAuthError {
    /// Shorthand for an [`EdgeAuthError::Unauthorized`].
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`EdgeAuthError::InternalServiceError`].
    pub fn key_infrastructure(reason: impl Into<String>) -> Self {
        Self::InternalServiceError {
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`EdgeAuthError::EventShape`].
    pub fn event_shape(reason: impl Into<String>) -> Self {
        Self::EventShape {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::InternalServiceError { .. } => ErrorCode::KeyInfrastructure,
            Self::EventShape { .. } => ErrorCode::EventShape,
            Self::Handler(_) => ErrorCode::HandlerFailed,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether an operator needs to look at this (as opposed to a client mistake).
    #[must_use]
    pub const fn is_operational(&self) -> bool {
        !matches!(self, Self::Unauthorized { .. })
    }
}

/// Failure reported by a downstream handler.
///
/// With a status code it is a deliberate HTTP answer (for example a 403 from
/// the authorization step); without one it is an unexpected fault.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct HandlerError {
    /// HTTP status to answer with, if the failure is a deliberate answer
    pub status_code: Option<u16>,
    /// Body to answer with
    pub body: Option<Value>,
    /// Short machine-readable code
    pub code: String,
    /// Operator-facing message
    pub message: String,
}

impl HandlerError {
    /// A deliberate HTTP answer with a status and body.
    #[must_use]
    pub fn with_status(status_code: u16, body: Value) -> Self {
        Self {
            status_code: Some(status_code),
            message: body
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Request rejected")
                .to_string(),
            body: Some(body),
            code: format!("HTTP_{status_code}"),
        }
    }

    /// An unexpected fault without an HTTP meaning.
    pub fn unexpected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            body: None,
            code: code.into(),
            message: message.into(),
        }
    }

    /// The canonical 401 answer.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::with_status(401, json!({ "title": "Unauthorized" }))
    }
}

impl From<EdgeAuthError> for HandlerError {
    fn from(err: EdgeAuthError) -> Self {
        match err {
            EdgeAuthError::Unauthorized { .. } | EdgeAuthError::InternalServiceError { .. } => {
                Self::unauthorized()
            }
            EdgeAuthError::Handler(inner) => inner,
            other => Self::unexpected(other.code().as_str(), sanitize_message(&other.to_string())),
        }
    }
}

/// Sanitize a message by removing sensitive information
#[must_use]
pub fn sanitize_message(message: &str) -> String {
    if contains_sensitive_info(message) {
        return "Request could not be processed".to_string();
    }
    message.to_string()
}

/// Check if a string contains sensitive information
#[must_use]
pub fn contains_sensitive_info(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

// ============================================================================
// From trait implementations for automatic error conversion
// ============================================================================

impl From<jsonwebtoken::errors::Error> for EdgeAuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        let reason = match err.kind() {
            ErrorKind::ExpiredSignature => "token expired".to_string(),
            ErrorKind::ImmatureSignature => "token not yet valid".to_string(),
            ErrorKind::InvalidSignature => "signature invalid".to_string(),
            ErrorKind::InvalidIssuer => "issuer mismatch".to_string(),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                "algorithm not accepted".to_string()
            }
            ErrorKind::MissingRequiredClaim(claim) => format!("missing claim {claim}"),
            _ => format!("token rejected: {err}"),
        };
        Self::Unauthorized { reason }
    }
}

impl From<PlatformError> for EdgeAuthError {
    fn from(err: PlatformError) -> Self {
        Self::InternalServiceError {
            reason: err.to_string(),
        }
    }
}
