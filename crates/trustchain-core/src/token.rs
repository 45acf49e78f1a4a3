//! Token signing and decoding
//!
//! A token is `base64url(header).base64url(claims).base64url(signature)`
//! without padding, where the signature is Ed25519 over the first two
//! segments joined by `.`, made with the key pair whose public key is `iss`.

use crate::claims::Claims;
use crate::error::{CoreError, Result};
use crate::nkey::{base32_encode, KeyPair};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Signing algorithm advertised in the token header
pub const ALGORITHM: &str = "ed25519-nkey";

/// Token type advertised in the token header
pub const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    typ: String,
    alg: String,
}

/// Sign claims with the issuer key pair, stamping `iss`, `iat` and `jti`
///
/// Returns the signed token together with the claims exactly as embedded.
pub fn encode(claims: &Claims, issuer: &KeyPair) -> Result<(Claims, String)> {
    encode_at(claims, issuer, chrono::Utc::now().timestamp())
}

/// Sign claims with an explicit issued-at time
pub fn encode_at(claims: &Claims, issuer: &KeyPair, issued_at: i64) -> Result<(Claims, String)> {
    let mut claims = claims.clone();
    claims.iss = issuer.public_key();
    claims.iat = issued_at;
    claims.jti = claims_digest(&claims)?;

    let token = sign_payload(&claims, issuer)?;
    Ok((claims, token))
}

/// Request to revoke account tokens, signed by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub jti: String,
    pub iat: i64,
    pub iss: String,
    pub sub: String,
    pub nats: DeleteRequestData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequestData {
    /// Public keys of the accounts to revoke
    pub accounts: Vec<String>,
    #[serde(rename = "type")]
    pub request_type: String,
    pub version: u8,
}

/// Sign a request deleting the given accounts' tokens
pub fn encode_delete_request(accounts: &[String], operator: &KeyPair) -> Result<String> {
    let mut request = DeleteRequest {
        jti: String::new(),
        iat: chrono::Utc::now().timestamp(),
        iss: operator.public_key(),
        sub: operator.public_key(),
        nats: DeleteRequestData {
            accounts: accounts.to_vec(),
            request_type: "generic".into(),
            version: crate::claims::CLAIMS_VERSION,
        },
    };
    request.jti = base32_encode(&Sha256::digest(serde_json::to_vec(&request)?));

    sign_payload(&request, operator)
}

/// Decode a delete request and verify it against its issuer
pub fn decode_delete_request(token: &str) -> Result<DeleteRequest> {
    let (payload, _) = verify_segments(token)?;
    let request: DeleteRequest = serde_json::from_slice(&payload)?;
    verify_signature(token, &request.iss)?;
    Ok(request)
}

fn sign_payload<T: Serialize>(payload: &T, issuer: &KeyPair) -> Result<String> {
    let header = Header {
        typ: TOKEN_TYPE.into(),
        alg: ALGORITHM.into(),
    };

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?),
    );

    let signature = issuer.sign(signing_input.as_bytes());
    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

/// Decode a token and verify its signature against the `iss` claim
pub fn decode(token: &str) -> Result<Claims> {
    let (payload, _) = verify_segments(token)?;
    let claims: Claims = serde_json::from_slice(&payload)?;
    verify_signature(token, &claims.iss)?;
    Ok(claims)
}

/// Split a token, check its header and return the decoded payload and signature
fn verify_segments(token: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let token = token.trim();
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(CoreError::MalformedToken(format!(
            "expected 3 segments, got {}",
            parts.len()
        )));
    }

    let header: Header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0])?)?;
    if header.alg != ALGORITHM {
        return Err(CoreError::MalformedToken(format!(
            "unsupported algorithm '{}'",
            header.alg
        )));
    }

    Ok((URL_SAFE_NO_PAD.decode(parts[1])?, URL_SAFE_NO_PAD.decode(parts[2])?))
}

/// Verify the token signature against the given public key
fn verify_signature(token: &str, public_key: &str) -> Result<()> {
    let token = token.trim();
    let split = token
        .rfind('.')
        .ok_or_else(|| CoreError::MalformedToken("missing signature".into()))?;
    let signature = URL_SAFE_NO_PAD.decode(&token[split + 1..])?;

    KeyPair::verify(public_key, token[..split].as_bytes(), &signature)
}

/// Digest identifying a claim set: base32(SHA-256(claims with empty jti))
fn claims_digest(claims: &Claims) -> Result<String> {
    let mut unidentified = claims.clone();
    unidentified.jti = String::new();

    let digest = Sha256::digest(serde_json::to_vec(&unidentified)?);
    Ok(base32_encode(&digest))
}

/// Format the credentials bundle handed to clients: user token plus user seed
pub fn format_user_credentials(token: &str, seed: &str) -> String {
    format!(
        "-----BEGIN NATS USER JWT-----\n\
         {}\n\
         ------END NATS USER JWT------\n\
         \n\
         ************************* IMPORTANT *************************\n\
         NKEY Seed printed below can be used to sign and prove identity.\n\
         NKEYs are sensitive and should be treated as secrets.\n\
         \n\
         -----BEGIN USER NKEY SEED-----\n\
         {}\n\
         ------END USER NKEY SEED------\n\
         \n\
         *************************************************************\n",
        token, seed
    )
}

/// Extract the token and seed from a credentials bundle
pub fn parse_user_credentials(creds: &str) -> Result<(String, String)> {
    let token = extract_block(creds, "-----BEGIN NATS USER JWT-----")
        .ok_or_else(|| CoreError::MalformedToken("credentials missing user JWT".into()))?;
    let seed = extract_block(creds, "-----BEGIN USER NKEY SEED-----")
        .ok_or_else(|| CoreError::MalformedToken("credentials missing user seed".into()))?;

    Ok((token, seed))
}

fn extract_block(text: &str, begin: &str) -> Option<String> {
    let mut lines = text.lines().skip_while(|line| line.trim() != begin);
    lines.next()?;
    lines
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| !line.starts_with("---"))
        .map(str::to_string)
}
