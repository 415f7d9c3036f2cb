//! Error types for the posts client and its query store.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the client can surface.
///
/// `Clone` so that a single failed in-flight request can be handed to every
/// caller that was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Network or connection failure before a response arrived.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Server answered with a non-2xx status.
    #[error("http error {status}: {body}")]
    HttpError { status: u16, body: String },

    /// Request could not be constructed (credentials, body, URL).
    #[error("application error: {0}")]
    ApplicationError(String),

    /// 2xx response whose body does not decode into the expected shape.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Wrap any request-construction failure with a normalized message.
    pub fn application(context: &str, cause: impl std::fmt::Display) -> Self {
        Error::ApplicationError(format!("{}: {}", context, cause))
    }

    /// HTTP status of the failure, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::DeserializationError(e.to_string())
        } else if e.is_builder() {
            Error::ApplicationError(e.to_string())
        } else {
            Error::TransportError(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = Error::HttpError {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "http error 404: not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_application_error_wraps_message() {
        let err = Error::application("failed to build add_post request", "boom");
        assert_eq!(
            err,
            Error::ApplicationError("failed to build add_post request: boom".to_string())
        );
        assert_eq!(err.status(), None);
    }
}
