//! Error types for LMS API requests.

use thiserror::Error;

/// Result type for LMS API requests.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur while dispatching a request.
///
/// The dispatcher does not interpret status codes. Anything outside 2xx
/// comes back as [`ApiError::Status`] with the server body untouched, and
/// callers decide what a given status means for them.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    /// Network unreachable, connection reset, timeout, unreadable body.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Method string that is not a valid HTTP token. Never sent.
    #[error("Invalid HTTP method: {0:?}")]
    InvalidMethod(String),
}

impl ApiError {
    /// HTTP status for [`ApiError::Status`].
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server said the credential is missing or no longer valid.
    #[inline]
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Check if this is an access denied error.
    #[inline]
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        self.status()
            .is_some_and(crate::client::utils::is_access_denied_status)
    }

    /// Server error body decoded as JSON, when there is one.
    pub fn payload(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Status { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }

    /// Human readable server message.
    ///
    /// Looks for `message`, then `error.message`, then a string `error`,
    /// falling back to the raw body.
    pub fn server_message(&self) -> Option<String> {
        let ApiError::Status { body, .. } = self else {
            return None;
        };

        if let Some(payload) = self.payload() {
            let found = payload
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| payload.pointer("/error/message").and_then(|m| m.as_str()))
                .or_else(|| payload.get("error").and_then(|m| m.as_str()));
            if let Some(msg) = found {
                return Some(msg.to_string());
            }
        }

        if body.trim().is_empty() {
            None
        } else {
            Some(body.clone())
        }
    }
}
