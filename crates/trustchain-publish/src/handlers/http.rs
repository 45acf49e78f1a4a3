//! HTTP account server publisher
//!
//! Speaks the account server's REST protocol:
//!
//! - `POST {url}/jwt/v1/accounts/{subject}` with the account token as body
//! - `DELETE {url}/jwt/v1/accounts/{subject}` with an operator-signed
//!   delete request as body
//!
//! Every request carries the system user token as bearer credential and a
//! `Nats-Signature` header holding the body signed with the system user seed.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use tracing::{debug, info};
use trustchain_core::token;

use crate::error::{PublishError, Result};
use crate::publisher::{Connector, TokenPublisher};
use crate::types::{ConnectOptions, SystemCredentials};
use trustchain_core::KeyPair;

/// Header carrying the body signature
pub const SIGNATURE_HEADER: &str = "Nats-Signature";

/// Opens [`HttpPublisher`]s
#[derive(Debug, Default, Clone)]
pub struct HttpConnector;

impl HttpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, options: ConnectOptions) -> Result<Box<dyn TokenPublisher>> {
        Ok(Box::new(HttpPublisher::new(options)?))
    }
}

/// Publisher bound to one account server and one system identity
pub struct HttpPublisher {
    http_client: reqwest::Client,
    base_url: String,
    credentials: SystemCredentials,
    operator: Option<KeyPair>,
}

impl HttpPublisher {
    /// Build a client for the given options, pinning the CA bundle if set
    pub fn new(options: ConnectOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(options.timeout);

        if let Some(pem) = &options.ca_bundle {
            let certificates = reqwest::Certificate::from_pem_bundle(pem)
                .map_err(|e| PublishError::InvalidCaBundle(e.to_string()))?;
            if certificates.is_empty() {
                return Err(PublishError::InvalidCaBundle("no certificates in bundle".into()));
            }

            builder = builder.tls_built_in_root_certs(false);
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }

        let http_client = builder
            .build()
            .map_err(|e| PublishError::ConnectionFailed(e.to_string()))?;

        debug!(url = %options.url, "Account server client ready");

        Ok(Self {
            http_client,
            base_url: options.url.trim_end_matches('/').to_string(),
            credentials: options.credentials,
            operator: options.operator,
        })
    }

    /// URL of the account resource for a subject
    pub fn account_url(&self, subject: &str) -> String {
        format!("{}/jwt/v1/accounts/{}", self.base_url, subject)
    }

    async fn send(&self, request: reqwest::RequestBuilder, body: String) -> Result<()> {
        let signature = URL_SAFE_NO_PAD.encode(self.credentials.sign(body.as_bytes()));

        let response = request
            .bearer_auth(&self.credentials.jwt)
            .header(SIGNATURE_HEADER, signature)
            .header(reqwest::header::CONTENT_TYPE, "application/jwt")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(PublishError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl TokenPublisher for HttpPublisher {
    async fn push(&self, token: &str) -> Result<()> {
        let claims = token::decode(token)?;
        self.update(&claims.sub, token).await
    }

    async fn update(&self, subject: &str, token: &str) -> Result<()> {
        self.send(self.http_client.post(self.account_url(subject)), token.to_string())
            .await?;

        info!(subject = %subject, "Published account token");
        Ok(())
    }

    async fn delete(&self, public_key: &str) -> Result<()> {
        let operator = self.operator.as_ref().ok_or_else(|| {
            PublishError::InvalidCredentials("operator key pair required to revoke tokens".into())
        })?;

        let request = token::encode_delete_request(&[public_key.to_string()], operator)?;
        self.send(self.http_client.delete(self.account_url(public_key)), request)
            .await?;

        info!(subject = %public_key, "Revoked account token");
        Ok(())
    }

    fn description(&self) -> &str {
        "http account server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustchain_core::KeyPrefix;

    fn options(url: &str) -> ConnectOptions {
        let user = KeyPair::create(KeyPrefix::User);
        let credentials = SystemCredentials::new("a.b.c", user).unwrap();
        ConnectOptions::new(url, credentials)
    }

    #[test]
    fn test_account_url() {
        let publisher = HttpPublisher::new(options("https://accounts.example.com/")).unwrap();
        assert_eq!(
            publisher.account_url("AABC"),
            "https://accounts.example.com/jwt/v1/accounts/AABC"
        );
    }

    #[test]
    fn test_invalid_ca_bundle() {
        let options = options("https://accounts.example.com").with_ca_bundle(b"not a pem".to_vec());
        assert!(matches!(
            HttpPublisher::new(options),
            Err(PublishError::InvalidCaBundle(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_operator() {
        let publisher = HttpPublisher::new(options("https://accounts.example.com")).unwrap();
        let result = publisher.delete("AABC").await;
        assert!(matches!(result, Err(PublishError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_push_rejects_malformed_token() {
        let publisher = HttpPublisher::new(options("https://accounts.example.com")).unwrap();
        let result = publisher.push("garbage").await;
        assert!(matches!(result, Err(PublishError::Core(_))));
    }
}
