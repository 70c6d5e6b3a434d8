use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    /// The request gateway could not deliver the call or receive its answer.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// The host received the call and refused it.
    #[error("host rejected request: {0}")]
    Host(HostError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Host-reported error code, if the host rejected the call.
    pub fn host_code(&self) -> Option<&str> {
        match self {
            Self::Host(err) => Some(&err.code),
            _ => None,
        }
    }
}

impl From<HostError> for Error {
    fn from(value: HostError) -> Self {
        Self::Host(value)
    }
}

/// Failure payload reported by the host. The SDK passes it through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostError {
    pub code: String,
    pub message: String,
}

impl HostError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, HostError};

    #[test]
    fn host_error_display_includes_code_and_message() {
        let err = Error::from(HostError::new("NAMESPACE_VIOLATION", "table users is not owned"));
        assert_eq!(
            err.to_string(),
            "host rejected request: [NAMESPACE_VIOLATION] table users is not owned"
        );
        assert_eq!(err.host_code(), Some("NAMESPACE_VIOLATION"));
    }

    #[test]
    fn non_host_errors_have_no_host_code() {
        let err = Error::Gateway("channel closed".into());
        assert!(err.host_code().is_none());
    }
}
