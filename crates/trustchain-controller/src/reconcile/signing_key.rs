//! SigningKey reconciliation
//!
//! A signing key gets its own seed, with the prefix of the identity it signs
//! for, and records which object owns it. Owners pick up the key through
//! their membership stage once both conditions hold.

use tracing::debug;
use trustchain_core::resource::API_VERSION;
use trustchain_core::{
    ConditionType, HasConditions, ObjectKey, Reason, Resource, ResourceKind, SigningKey, TypedObjectReference,
};

use super::seed::ensure_seed;
use super::{fetch, found, stage, ConditionError, Context, Outcome};
use crate::error::{Action, Result};

/// Typed form of the owner named in a signing key's spec
fn owner_reference(signing_key: &SigningKey) -> TypedObjectReference {
    let spec_ref = &signing_key.spec.owner_ref;
    let api_version = if spec_ref.api_version.is_empty() {
        API_VERSION.to_string()
    } else {
        spec_ref.api_version.clone()
    };

    TypedObjectReference {
        api_version,
        kind: spec_ref.kind.clone(),
        name: spec_ref.name.clone(),
        namespace: None,
        uid: None,
    }
}

/// Look up the owner named in the spec
///
/// The owner kind must match the key type: operator keys belong to an
/// Operator, account keys to an Account.
pub async fn resolve_owner(ctx: &Context, signing_key: &SigningKey) -> Result<Outcome<Resource>> {
    let reference = owner_reference(signing_key);
    let expected = signing_key.spec.key_type.owner_kind();

    match ctx.registry.resolve_kind(&reference) {
        Some(kind) if kind == expected => {}
        Some(kind) => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::InvalidSigningKeyOwner,
                format!(
                    "a {:?} signing key must be owned by a {}, not a {}",
                    signing_key.spec.key_type, expected, kind
                ),
            )))
        }
        None => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::InvalidSigningKeyOwner,
                format!("unsupported owner kind {}", reference.kind_string()),
            )))
        }
    }

    let key = reference.key_or(&signing_key.metadata.namespace);
    match found(ctx.store.get(expected, &key).await)? {
        Some(owner) => Ok(Outcome::Ready(owner)),
        None => Ok(Outcome::Blocked(ConditionError::failed(
            Reason::NotFound,
            format!("owner {} {} not found", expected, key),
        ))),
    }
}

/// Reconcile one SigningKey
pub async fn reconcile_signing_key(ctx: &Context, key: &ObjectKey) -> Result<Action> {
    let mut signing_key: SigningKey = match fetch(ctx, ResourceKind::SigningKey, key).await? {
        Some(signing_key) => signing_key,
        None => {
            debug!(signing_key = %key, "Signing key no longer exists");
            return Ok(Action::await_change());
        }
    };

    if signing_key.metadata.is_deleting() {
        return Ok(Action::await_change());
    }

    let snapshot = signing_key.status.clone();
    signing_key.initialize_conditions();

    let result = run(ctx, &mut signing_key).await;

    if signing_key.status != snapshot {
        ctx.store.update_status(signing_key.into()).await?;
    }
    result
}

async fn run(ctx: &Context, signing_key: &mut SigningKey) -> Result<Action> {
    let seeded = ensure_seed(ctx, signing_key).await;
    stage!(signing_key, ConditionType::SeedSecretReady, seeded);

    let resolved = resolve_owner(ctx, signing_key).await;
    let owner = stage!(signing_key, ConditionType::OwnerResolved, resolved);
    signing_key.status.owner_ref = Some(TypedObjectReference::to_object(owner.kind(), owner.metadata()));

    Ok(Action::await_change())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::testing::{self, harness, reference, NAMESPACE};
    use crate::store::ObjectStore;
    use trustchain_core::resource::SigningKeyType;
    use trustchain_core::{ConditionStatus, KeyPrefix};

    async fn stored(h: &testing::Harness, name: &str) -> SigningKey {
        let stored = h
            .store
            .get(ResourceKind::SigningKey, &ObjectKey::new(NAMESPACE, name))
            .await
            .unwrap();
        stored.try_into().unwrap()
    }

    #[tokio::test]
    async fn test_operator_key_resolves_owner() {
        let h = harness();
        let operator = h
            .store
            .create(testing::operator("root", "sys", "sys-user").into())
            .await
            .unwrap();
        h.store
            .create(testing::signing_key("root-sk", SigningKeyType::Operator, "root").into())
            .await
            .unwrap();

        reconcile_signing_key(&h.ctx, &ObjectKey::new(NAMESPACE, "root-sk")).await.unwrap();

        let sk = stored(&h, "root-sk").await;
        assert!(sk.is_ready());
        let owner_ref = sk.status.owner_ref.unwrap();
        assert_eq!(owner_ref.kind, "Operator");
        assert_eq!(owner_ref.uid.as_deref(), Some(operator.metadata().uid.as_str()));
        assert!(sk.status.key_pair.unwrap().public_key.starts_with(KeyPrefix::Operator.letter()));
    }

    #[tokio::test]
    async fn test_key_type_must_match_owner_kind() {
        let h = harness();
        h.store
            .create(testing::account("acme", reference(ResourceKind::Operator, "root")).into())
            .await
            .unwrap();
        let mut sk = testing::signing_key("acme-sk", SigningKeyType::Operator, "acme");
        sk.spec.owner_ref.kind = "Account".into();
        h.store.create(sk.into()).await.unwrap();

        reconcile_signing_key(&h.ctx, &ObjectKey::new(NAMESPACE, "acme-sk")).await.unwrap();

        let sk = stored(&h, "acme-sk").await;
        let condition = sk.status.conditions.get(ConditionType::OwnerResolved).unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, Reason::InvalidSigningKeyOwner.as_str());
        assert!(sk.is_condition_true(ConditionType::SeedSecretReady));
    }

    #[tokio::test]
    async fn test_signing_key_cannot_own_signing_key() {
        let h = harness();
        let mut sk = testing::signing_key("nested", SigningKeyType::Account, "other-sk");
        sk.spec.owner_ref.kind = "SigningKey".into();
        h.store.create(sk.into()).await.unwrap();

        reconcile_signing_key(&h.ctx, &ObjectKey::new(NAMESPACE, "nested")).await.unwrap();

        let sk = stored(&h, "nested").await;
        let condition = sk.status.conditions.get(ConditionType::OwnerResolved).unwrap();
        assert_eq!(condition.reason, Reason::InvalidSigningKeyOwner.as_str());
    }

    #[tokio::test]
    async fn test_missing_owner_is_not_found() {
        let h = harness();
        h.store
            .create(testing::signing_key("acme-sk", SigningKeyType::Account, "acme").into())
            .await
            .unwrap();

        reconcile_signing_key(&h.ctx, &ObjectKey::new(NAMESPACE, "acme-sk")).await.unwrap();

        let sk = stored(&h, "acme-sk").await;
        let condition = sk.status.conditions.get(ConditionType::OwnerResolved).unwrap();
        assert_eq!(condition.reason, Reason::NotFound.as_str());
        assert!(sk.status.owner_ref.is_none());
    }
}
