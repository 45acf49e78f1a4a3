//! Connection parameters for the account server

use std::time::Duration;
use trustchain_core::nkey::KeyPrefix;
use trustchain_core::token::parse_user_credentials;
use trustchain_core::KeyPair;

use crate::error::{PublishError, Result};

/// Default timeout for account server requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials of a user in the operator's system account
///
/// Publication is authenticated as this user: the token travels as a bearer
/// credential and each request body is signed with the user's seed.
#[derive(Debug, Clone)]
pub struct SystemCredentials {
    /// Signed user token
    pub jwt: String,

    key_pair: KeyPair,
}

impl SystemCredentials {
    pub fn new(jwt: impl Into<String>, key_pair: KeyPair) -> Result<Self> {
        if key_pair.prefix() != KeyPrefix::User {
            return Err(PublishError::InvalidCredentials(format!(
                "expected a user seed, got {}",
                key_pair.prefix()
            )));
        }

        Ok(Self {
            jwt: jwt.into(),
            key_pair,
        })
    }

    /// Parse a credentials bundle (user token + user seed)
    pub fn from_creds(creds: &str) -> Result<Self> {
        let (jwt, seed) = parse_user_credentials(creds)
            .map_err(|e| PublishError::InvalidCredentials(e.to_string()))?;
        let key_pair =
            KeyPair::from_seed(&seed).map_err(|e| PublishError::InvalidCredentials(e.to_string()))?;

        Self::new(jwt, key_pair)
    }

    /// Public key of the system user
    pub fn public_key(&self) -> String {
        self.key_pair.public_key()
    }

    /// Sign a request body as the system user
    pub fn sign(&self, body: &[u8]) -> [u8; 64] {
        self.key_pair.sign(body)
    }
}

/// Everything needed to open a publisher against one account server
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Account server base URL
    pub url: String,

    /// System account user identity
    pub credentials: SystemCredentials,

    /// Operator key pair, required to sign revocations
    pub operator: Option<KeyPair>,

    /// PEM-encoded CA bundle used instead of the system roots
    pub ca_bundle: Option<Vec<u8>>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ConnectOptions {
    pub fn new(url: impl Into<String>, credentials: SystemCredentials) -> Self {
        Self {
            url: url.into(),
            credentials,
            operator: None,
            ca_bundle: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_operator(mut self, operator: KeyPair) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn with_ca_bundle(mut self, pem: Vec<u8>) -> Self {
        self.ca_bundle = Some(pem);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
