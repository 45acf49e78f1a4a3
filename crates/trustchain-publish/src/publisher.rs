//! Publication boundary
//!
//! A [`Connector`] opens an authenticated [`TokenPublisher`] for one
//! operator's account server. Reconcilers depend only on these traits, so
//! the transport can be swapped (HTTP, mock) without touching them.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ConnectOptions;

/// Push, update and revoke account tokens on a remote authority
#[async_trait]
pub trait TokenPublisher: Send + Sync {
    /// Publish a token for the subject it names
    async fn push(&self, token: &str) -> Result<()>;

    /// Replace the token published for `subject`
    async fn update(&self, subject: &str, token: &str) -> Result<()>;

    /// Revoke the token published for `public_key`
    async fn delete(&self, public_key: &str) -> Result<()>;

    /// Get a description of this publisher (for logging)
    fn description(&self) -> &str {
        "token publisher"
    }
}

/// Opens publishers against an account server
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: ConnectOptions) -> Result<Box<dyn TokenPublisher>>;
}
