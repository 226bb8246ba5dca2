//! Error types shared across the client subsystem.

use serde::Deserialize;
use thiserror::Error;

/// REST API error as seen by stores and callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    /// True for HTTP 429 responses, which stores swallow rather than
    /// surface (transient throttling self-resolves on the next fetch).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::Http { status: 429, .. })
    }

    /// Best-effort human-readable message for display.
    ///
    /// Prefers the server's `{"message": ...}` body field, falling back
    /// to the error's own rendering.
    pub fn server_message(&self) -> String {
        if let ApiError::Http { body, .. } = self {
            if let Some(msg) = try_error_message(body) {
                return msg;
            }
        }
        self.to_string()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Attempt to parse an API error body into a user-facing message.
/// Prefers `message`, falls back to `error`.
pub fn try_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    for candidate in [parsed.message, parsed.error].into_iter().flatten() {
        if !candidate.trim().is_empty() {
            return Some(candidate);
        }
    }
    None
}

/// Transport-level failure. Never escapes the connection loop to a
/// caller; observed only through state transitions and logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("transport I/O error: {0}")]
    Io(String),
    #[error("connection closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_prefers_body_message_field() {
        let err = ApiError::Http {
            status: 400,
            body: r#"{"message": "Content is required"}"#.to_string(),
        };
        assert_eq!(err.server_message(), "Content is required");
    }

    #[test]
    fn server_message_falls_back_to_display() {
        let err = ApiError::Http {
            status: 500,
            body: "<html>oops</html>".to_string(),
        };
        assert_eq!(err.server_message(), "HTTP 500: <html>oops</html>");
    }

    #[test]
    fn rate_limit_detection_is_status_based() {
        let throttled = ApiError::Http {
            status: 429,
            body: String::new(),
        };
        assert!(throttled.is_rate_limited());
        assert!(!ApiError::Network("timeout".to_string()).is_rate_limited());
    }
}
