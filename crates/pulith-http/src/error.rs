//! Error types for pulith-http.

use thiserror::Error;

/// Errors produced while building, sending or consuming HTTP messages.
///
/// The type is `Clone` so a single stream failure can be delivered to every
/// branch of a teed body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("the value of \"{name}\" is out of range. It must be {expected}. Received {actual:?}")]
    OutOfRange {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Protocol must be one of data:, http:, https: (got {scheme}:)")]
    UnsupportedProtocol { scheme: String },

    #[error("Request with {method} method cannot have body")]
    BodyNotAllowed { method: String },

    #[error("body was already consumed")]
    BodyUsed,

    #[error("The operation was aborted")]
    Aborted,

    #[error("No supported ALPN protocol was negotiated, got {0}")]
    UnsupportedAlpn(String),

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("Premature close")]
    PrematureClose,

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("redirect blocked")]
    RedirectBlocked,

    #[error("invalid JSON body: {0}")]
    Json(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FetchError {
    pub(crate) fn out_of_range(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        FetchError::OutOfRange {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        FetchError::Transport(err.to_string())
    }

    /// Returns `true` if the error was caused by the abort signal.
    pub fn is_abort(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }

    /// Returns `true` if a body was read after it had already been consumed.
    pub fn is_body_used(&self) -> bool {
        matches!(self, FetchError::BodyUsed)
    }

    /// Returns `true` for errors raised before any I/O took place.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FetchError::OutOfRange { .. }
                | FetchError::InvalidUrl(_)
                | FetchError::InvalidMethod(_)
                | FetchError::InvalidDataUrl(_)
                | FetchError::UnsupportedProtocol { .. }
                | FetchError::BodyNotAllowed { .. }
        )
    }
}

impl From<url::ParseError> for FetchError {
    fn from(e: url::ParseError) -> Self {
        FetchError::InvalidUrl(e.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Json(e.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_the_value() {
        let err = FetchError::out_of_range("name", "a valid header name", "bad name");
        assert_eq!(
            err.to_string(),
            "the value of \"name\" is out of range. It must be a valid header name. Received \"bad name\""
        );
        assert!(err.is_validation());
    }

    #[test]
    fn classification_helpers() {
        assert!(FetchError::Aborted.is_abort());
        assert!(FetchError::BodyUsed.is_body_used());
        assert!(!FetchError::PrematureClose.is_validation());
        assert_eq!(FetchError::BodyUsed.to_string(), "body was already consumed");
    }
}
