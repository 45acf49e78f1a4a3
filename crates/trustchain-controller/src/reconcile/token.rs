//! Token secret reconciliation
//!
//! A freshly signed token always carries a new `iat` (and a `jti` derived
//! from it), so the stored token is compared on claim content only. It is
//! kept verbatim unless that content changed or it no longer decodes.

use tracing::{debug, info, warn};
use trustchain_core::{token, Claims, KeyPair, Object, ObjectKey};

use super::{found, Context, Outcome};
use crate::error::Result;
use crate::events::{Event, EventReason};
use crate::secrets::{self, JWT_KEY};
use crate::store::Secret;

/// Token in force after reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenState {
    pub token: String,
    /// True when the stored token was created or replaced in this pass
    pub changed: bool,
}

/// Stored token, if it decodes and embeds the same claim content as `embedded`
fn reusable<'a>(existing: &'a Secret, embedded: &Claims) -> Option<&'a str> {
    let stored = existing.get(JWT_KEY)?;
    match token::decode(stored) {
        Ok(decoded) if decoded.canonical_eq(embedded) => Some(stored),
        Ok(_) => {
            debug!(secret = %existing.key(), "Stored token claims are out of date");
            None
        }
        Err(e) => {
            warn!(secret = %existing.key(), error = %e, "Stored token does not decode, replacing");
            None
        }
    }
}

/// Ensure the token secret holds a token for `claims` signed by `issuer`
pub async fn reconcile_token<R: Object + ?Sized>(
    ctx: &Context,
    resource: &R,
    secret_name: &str,
    claims: &Claims,
    issuer: &KeyPair,
) -> Result<Outcome<TokenState>> {
    let secret_key = ObjectKey::new(&resource.metadata().namespace, secret_name);
    let (embedded, candidate) = token::encode(claims, issuer)?;

    let existing = match found(ctx.store.get_secret(&secret_key).await)? {
        Some(existing) => existing,
        None => {
            ctx.store
                .create_secret(secrets::jwt_secret(resource, secret_name, &candidate))
                .await?;

            info!(secret = %secret_key, subject = %embedded.sub, "Created token secret");
            ctx.events.record(Event::normal(
                resource,
                EventReason::JwtSecretCreated,
                format!("Created JWT secret {}", secret_name),
            ));
            return Ok(Outcome::Ready(TokenState {
                token: candidate,
                changed: true,
            }));
        }
    };

    if let Some(stored) = reusable(&existing, &embedded) {
        let mut desired = secrets::jwt_secret(resource, secret_name, stored);
        if !existing.semantic_eq(&desired) {
            desired.metadata.resource_version = existing.metadata.resource_version;
            ctx.store.update_secret(desired).await?;
            info!(secret = %secret_key, "Repaired token secret metadata");
        }

        return Ok(Outcome::Ready(TokenState {
            token: stored.to_string(),
            changed: false,
        }));
    }

    let mut desired = secrets::jwt_secret(resource, secret_name, &candidate);
    if existing.immutable || desired.immutable {
        ctx.store.delete_secret(&secret_key).await?;
        ctx.store.create_secret(desired).await?;
    } else {
        desired.metadata.resource_version = existing.metadata.resource_version;
        ctx.store.update_secret(desired).await?;
    }

    info!(secret = %secret_key, subject = %embedded.sub, "Replaced token secret");
    ctx.events.record(Event::normal(
        resource,
        EventReason::JwtSecretUpdated,
        format!("Updated JWT secret {}", secret_name),
    ));

    Ok(Outcome::Ready(TokenState {
        token: candidate,
        changed: true,
    }))
}
