//! Token Publication
//!
//! Pushes signed account tokens to the operator's account server and revokes
//! them on deletion.
//!
//! ## Architecture
//!
//! A [`Connector`] opens a [`TokenPublisher`] authenticated as a user of the
//! operator's system account:
//!
//! - **HTTP**: the account server REST protocol, optionally pinned to a CA bundle
//! - **Mock**: records calls, for testing
//!
//! ## Usage
//!
//! ```ignore
//! use trustchain_publish::{ConnectOptions, Connector, HttpConnector, SystemCredentials};
//!
//! let credentials = SystemCredentials::from_creds(&creds)?;
//! let publisher = HttpConnector::new()
//!     .connect(ConnectOptions::new("https://accounts.example.com", credentials))
//!     .await?;
//!
//! publisher.push(&account_jwt).await?;
//! ```

pub mod error;
pub mod handlers;
pub mod publisher;
pub mod types;

pub use error::{PublishError, Result};
pub use handlers::{HttpConnector, MockConnector, PublishCall};
pub use publisher::{Connector, TokenPublisher};
pub use types::{ConnectOptions, SystemCredentials};
