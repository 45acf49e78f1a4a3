//! Issuer resolution
//!
//! An Account is issued by an Operator, either directly or through one of the
//! Operator's signing keys. A User is issued the same way by an Account. The
//! referenced object is looked up through the kind registry, then narrowed
//! to the shapes each kind accepts. A signing key's owner must be a root
//! identity, never another signing key, so resolution stops after one hop.

use tracing::debug;
use trustchain_core::{
    ConditionType, HasConditions, KeyPair, KeyPairStatus, KeyPrefix, ObjectKey, Reason, Resource, ResourceKind,
    SigningKey, TypedObjectReference,
};

use super::{found, try_ready, ConditionError, Context, Outcome};
use crate::error::Result;
use crate::secrets::SEED_KEY;

/// The identity that signs a resource's token
#[derive(Debug, Clone)]
pub struct ResolvedIssuer {
    /// Root identity the resource belongs to (Operator for accounts, Account for users)
    pub owner: Resource,
    /// Key pair whose seed signs the token
    pub signer: KeyPairStatus,
    /// Namespace holding the signer's seed secret
    pub signer_namespace: String,
    /// True when the signer is a signing key rather than the owner itself
    pub via_signing_key: bool,
}

impl ResolvedIssuer {
    pub fn owner_key(&self) -> ObjectKey {
        self.owner.key()
    }

    /// Public key of the owner identity
    pub fn owner_public_key(&self) -> Option<String> {
        self.owner
            .as_key_pairable()
            .key_pair()
            .map(|kp| kp.public_key.clone())
    }
}

/// Look up the object an issuer reference points at
///
/// Unknown kinds and missing objects need a spec change and are reported as
/// failed. An issuer whose seed is not ready yet is reported as unknown: the
/// issuer's own status change re-enqueues the caller.
pub async fn resolve_issuer(
    ctx: &Context,
    reference: &TypedObjectReference,
    fallback_namespace: &str,
) -> Result<Outcome<Resource>> {
    let kind = match ctx.registry.resolve_kind(reference) {
        Some(kind) => kind,
        None => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::UnsupportedIssuer,
                format!("unsupported issuer kind {}", reference.kind_string()),
            )))
        }
    };

    let key = reference.key_or(fallback_namespace);
    let mut issuer = match found(ctx.store.get(kind, &key).await)? {
        Some(issuer) => issuer,
        None => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::NotFound,
                format!("issuer {} {} not found", kind, key),
            )))
        }
    };

    let holder = issuer.as_key_pairable_mut();
    holder.initialize_conditions();
    if !holder.is_condition_true(ConditionType::SeedSecretReady) || holder.key_pair().is_none() {
        return Ok(Outcome::Blocked(ConditionError::unknown(
            Reason::NotReady,
            format!("issuer {} {} has no seed yet", kind, key),
        )));
    }

    debug!(issuer = %key, kind = %kind, "Resolved issuer");
    Ok(Outcome::Ready(issuer))
}

/// Owner recorded on a signing key's status
///
/// The owner must be an Operator or Account and must still carry the UID
/// recorded when ownership was resolved.
pub async fn resolve_signing_key_owner(ctx: &Context, signing_key: &SigningKey) -> Result<Outcome<Resource>> {
    let name = signing_key.metadata.key();
    let owner_ref = match &signing_key.status.owner_ref {
        Some(owner_ref) if signing_key.is_condition_true(ConditionType::OwnerResolved) => owner_ref,
        _ => {
            return Ok(Outcome::Blocked(ConditionError::unknown(
                Reason::NotReady,
                format!("signing key {} has no resolved owner", name),
            )))
        }
    };

    let kind = match ctx.registry.resolve_kind(owner_ref) {
        Some(kind @ (ResourceKind::Operator | ResourceKind::Account)) => kind,
        _ => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::InvalidSigningKeyOwner,
                format!(
                    "signing key {} is owned by a {}, expected Operator or Account",
                    name,
                    owner_ref.kind_string()
                ),
            )))
        }
    };

    let key = owner_ref.key_or(&signing_key.metadata.namespace);
    let owner = match found(ctx.store.get(kind, &key).await)? {
        Some(owner) => owner,
        None => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::NotFound,
                format!("owner {} {} of signing key {} not found", kind, key, name),
            )))
        }
    };

    if let Some(uid) = &owner_ref.uid {
        if owner.metadata().uid != *uid {
            return Ok(Outcome::Blocked(ConditionError::unknown(
                Reason::NotReady,
                format!("owner {} {} was replaced since signing key {} resolved it", kind, key, name),
            )));
        }
    }

    if owner.as_key_pairable().key_pair().is_none() {
        return Ok(Outcome::Blocked(ConditionError::unknown(
            Reason::NotReady,
            format!("owner {} {} has no seed yet", kind, key),
        )));
    }

    Ok(Outcome::Ready(owner))
}

/// Resolve an issuer reference and narrow it to what `root` identities may sign
///
/// Accepts the root kind itself, or a signing key owned by one.
async fn resolve_for_root(
    ctx: &Context,
    reference: &TypedObjectReference,
    fallback_namespace: &str,
    root: ResourceKind,
) -> Result<Outcome<ResolvedIssuer>> {
    let issuer = try_ready!(resolve_issuer(ctx, reference, fallback_namespace).await);

    match issuer {
        Resource::SigningKey(signing_key) => {
            let owner = try_ready!(resolve_signing_key_owner(ctx, &signing_key).await);
            if owner.kind() != root {
                return Ok(Outcome::Blocked(ConditionError::failed(
                    Reason::UnsupportedIssuer,
                    format!(
                        "signing key {} belongs to {} {}, expected a {}",
                        signing_key.metadata.key(),
                        owner.kind(),
                        owner.key(),
                        root
                    ),
                )));
            }

            let signer = match signing_key.status.key_pair.clone() {
                Some(signer) => signer,
                None => {
                    return Ok(Outcome::Blocked(ConditionError::unknown(
                        Reason::NotReady,
                        format!("signing key {} has no seed yet", signing_key.metadata.key()),
                    )))
                }
            };

            Ok(Outcome::Ready(ResolvedIssuer {
                owner,
                signer,
                signer_namespace: signing_key.metadata.namespace.clone(),
                via_signing_key: true,
            }))
        }
        issuer if issuer.kind() == root => {
            let signer = match issuer.as_key_pairable().key_pair().cloned() {
                Some(signer) => signer,
                None => {
                    return Ok(Outcome::Blocked(ConditionError::unknown(
                        Reason::NotReady,
                        format!("issuer {} has no seed yet", issuer.key()),
                    )))
                }
            };

            Ok(Outcome::Ready(ResolvedIssuer {
                signer_namespace: issuer.metadata().namespace.clone(),
                owner: issuer,
                signer,
                via_signing_key: false,
            }))
        }
        other => Ok(Outcome::Blocked(ConditionError::failed(
            Reason::UnsupportedIssuer,
            format!("{} {} cannot issue a {} token", other.kind(), other.key(), issued_kind(root)),
        ))),
    }
}

fn issued_kind(root: ResourceKind) -> ResourceKind {
    match root {
        ResourceKind::Operator => ResourceKind::Account,
        _ => ResourceKind::User,
    }
}

/// Issuer of an Account: its Operator or an Operator signing key
pub async fn resolve_account_issuer(
    ctx: &Context,
    reference: &TypedObjectReference,
    namespace: &str,
) -> Result<Outcome<ResolvedIssuer>> {
    resolve_for_root(ctx, reference, namespace, ResourceKind::Operator).await
}

/// Issuer of a User: its Account or an Account signing key
pub async fn resolve_user_issuer(
    ctx: &Context,
    reference: &TypedObjectReference,
    namespace: &str,
) -> Result<Outcome<ResolvedIssuer>> {
    resolve_for_root(ctx, reference, namespace, ResourceKind::Account).await
}

/// Load the signer's seed and check it against its recorded public key
pub async fn load_issuer_seed(
    ctx: &Context,
    namespace: &str,
    signer: &KeyPairStatus,
    expected: KeyPrefix,
) -> Result<Outcome<KeyPair>> {
    let secret_key = ObjectKey::new(namespace, &signer.seed_secret_name);

    let secret = match found(ctx.store.get_secret(&secret_key).await)? {
        Some(secret) => secret,
        None => {
            return Ok(Outcome::Blocked(ConditionError::unknown(
                Reason::IssuerSeedError,
                format!("issuer seed secret {} not found", secret_key),
            )))
        }
    };

    let key_pair = match secret.get(SEED_KEY).map(KeyPair::from_seed) {
        Some(Ok(key_pair)) => key_pair,
        Some(Err(e)) => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::IssuerSeedError,
                format!("issuer seed in {} is unreadable: {}", secret_key, e),
            )))
        }
        None => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::IssuerSeedError,
                format!("issuer seed secret {} has no '{}' field", secret_key, SEED_KEY),
            )))
        }
    };

    if key_pair.prefix() != expected {
        return Ok(Outcome::Blocked(ConditionError::failed(
            Reason::IssuerSeedError,
            format!("issuer seed in {} is a {} seed, expected {}", secret_key, key_pair.prefix(), expected),
        )));
    }

    if key_pair.public_key() != signer.public_key {
        return Ok(Outcome::Blocked(ConditionError::failed(
            Reason::PublicKeyMismatch,
            format!(
                "issuer seed in {} decodes to {}, issuer records {}",
                secret_key,
                key_pair.public_key(),
                signer.public_key
            ),
        )));
    }

    Ok(Outcome::Ready(key_pair))
}
