//! Error types for the event announcer Lambda functions.

use std::fmt::Display;

use aws_sdk_s3::error::DisplayErrorContext;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the event announcer Lambda functions.
#[derive(Error, Debug)]
pub enum Error {
    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error, carries the user-facing message as is.
    #[error("{0}")]
    Validation(String),

    /// The stored object changed between read and conditional write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap an AWS SDK failure, keeping the whole source chain.
    ///
    /// `SdkError`'s own `Display` only says "service error"; the service's
    /// error code and message live further down the chain.
    pub fn aws<E: std::error::Error>(context: impl Display, err: E) -> Self {
        Error::Aws(format!("{}: {}", context, DisplayErrorContext(err)))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Validation("Title is required.".into()).status_code(), 400);
        assert_eq!(Error::Conflict("etag".into()).status_code(), 500);
        assert_eq!(Error::NotFound("events.json".into()).status_code(), 500);
        assert_eq!(Error::Aws("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = Error::Validation("Email not provided.".to_string());
        assert_eq!(err.to_string(), "Email not provided.");
    }
}
