//! Error types for the trust-chain core

use thiserror::Error;

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while handling key material, tokens and selectors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Key material could not be decoded
    #[error("Invalid key encoding: {0}")]
    InvalidEncoding(String),

    /// Checksum embedded in an encoded key did not match
    #[error("Invalid key checksum")]
    InvalidChecksum,

    /// Prefix byte is not one of the supported key kinds
    #[error("Invalid key prefix: {0}")]
    InvalidPrefix(String),

    /// Seed decoded, but for a different key kind than required
    #[error("Unexpected key prefix: expected '{expected}', got '{actual}'")]
    UnexpectedPrefix { expected: String, actual: String },

    /// Token is not a well-formed `header.claims.signature` triple
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Token signature does not verify against its issuer
    #[error("Token signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Cryptographic error
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Label selector cannot be evaluated
    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),
}

impl From<ed25519_dalek::SignatureError> for CoreError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        CoreError::CryptoError(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for CoreError {
    fn from(err: base64::DecodeError) -> Self {
        CoreError::MalformedToken(err.to_string())
    }
}
