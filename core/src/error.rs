//! Error types for the request builder and dispatcher.
//!
//! # Design
//! Every failure surfaces as one `FetchError` carrying its kind and a
//! descriptive message. Nothing is retried or swallowed internally. The only
//! non-failing lookups are unmatched path-param placeholders and unmatched
//! path-param keys, which are left alone by `substitute_params`.

use thiserror::Error;

/// Errors returned while building, dispatching, or reading a request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL template did not parse after path-param substitution.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The body value does not match the declared encoding kind.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The declared encoding kind is not recognized.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The body value could not be serialized.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The upload source could not be opened or read.
    #[error("upload source unavailable: {0}")]
    SourceUnavailable(String),

    /// The transport failed before a response was received.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The response body could not be fully read.
    #[error("failed to read response body: {0}")]
    ReadError(String),
}

/// Discriminant of a [`FetchError`], for callers that only match on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUrl,
    TypeMismatch,
    UnsupportedEncoding,
    SerializationError,
    SourceUnavailable,
    TransportError,
    ReadError,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            FetchError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            FetchError::UnsupportedEncoding(_) => ErrorKind::UnsupportedEncoding,
            FetchError::SerializationError(_) => ErrorKind::SerializationError,
            FetchError::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            FetchError::TransportError(_) => ErrorKind::TransportError,
            FetchError::ReadError(_) => ErrorKind::ReadError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let err = FetchError::UnsupportedEncoding("yaml".to_string());
        assert_eq!(err.to_string(), "unsupported encoding: yaml");
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            FetchError::ReadError("eof".to_string()).kind(),
            ErrorKind::ReadError
        );
        assert_eq!(
            FetchError::InvalidUrl("x".to_string()).kind(),
            ErrorKind::InvalidUrl
        );
    }
}
