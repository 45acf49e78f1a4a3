//! Error types for token publication

use thiserror::Error;
use trustchain_core::CoreError;

/// Result type for publication operations
pub type Result<T> = std::result::Result<T, PublishError>;

/// Errors that can occur while talking to the account server
#[derive(Error, Debug)]
pub enum PublishError {
    /// Could not establish a connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// System account credentials are unusable
    #[error("Invalid system credentials: {0}")]
    InvalidCredentials(String),

    /// CA bundle could not be parsed
    #[error("Invalid CA bundle: {0}")]
    InvalidCaBundle(String),

    /// Account server answered with an error status
    #[error("Account server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Token or key material error
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PublishError {
    /// True if the account server does not know the subject
    pub fn is_not_found(&self) -> bool {
        matches!(self, PublishError::Rejected { status: 404, .. })
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            PublishError::ConnectionFailed(err.to_string())
        } else {
            PublishError::HttpError(err.to_string())
        }
    }
}
