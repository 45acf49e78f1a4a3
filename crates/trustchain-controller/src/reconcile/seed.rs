//! Seed secret lifecycle
//!
//! A resource's seed is generated once, on first reconciliation, and never
//! regenerated while its secret exists. An existing secret is only repaired
//! (rewritten to its desired shape) when it still decodes to the key pair
//! recorded in status.

use tracing::{debug, info};
use trustchain_core::{KeyPair, KeyPairStatus, KeyPairable, ObjectKey, Reason};

use super::{found, ConditionError, Context, Outcome};
use crate::error::Result;
use crate::events::{Event, EventReason};
use crate::secrets::{self, SEED_KEY};
use crate::store::StoreError;

/// Ensure the resource's seed secret exists and matches its recorded key pair
pub async fn ensure_seed<R: KeyPairable>(ctx: &Context, resource: &mut R) -> Result<Outcome<KeyPair>> {
    let secret_key = ObjectKey::new(&resource.metadata().namespace, resource.seed_secret_name());

    let existing = match found(ctx.store.get_secret(&secret_key).await)? {
        Some(existing) => existing,
        None => {
            let key_pair = KeyPair::create(resource.key_prefix());
            ctx.store
                .create_secret(secrets::seed_secret(&*resource, &key_pair))
                .await?;

            info!(secret = %secret_key, public_key = %key_pair.public_key(), "Created seed secret");
            ctx.events.record(Event::normal(
                &*resource,
                EventReason::SeedSecretCreated,
                format!("Created seed secret {}", secret_key.name),
            ));

            record_key_pair(resource, &key_pair);
            return Ok(Outcome::Ready(key_pair));
        }
    };

    let seed = match existing.get(SEED_KEY) {
        Some(seed) => seed,
        None => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::InvalidSeedSecret,
                format!("secret {} has no '{}' field", secret_key.name, SEED_KEY),
            )))
        }
    };

    let key_pair = match KeyPair::from_seed(seed) {
        Ok(key_pair) => key_pair,
        Err(e) => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::MalformedSeedSecret,
                format!("secret {} holds an unreadable seed: {}", secret_key.name, e),
            )))
        }
    };

    if key_pair.prefix() != resource.key_prefix() {
        return Ok(Outcome::Blocked(ConditionError::failed(
            Reason::MalformedSeedSecret,
            format!(
                "secret {} holds a {} seed, expected {}",
                secret_key.name,
                key_pair.prefix(),
                resource.key_prefix()
            ),
        )));
    }

    if let Some(recorded) = resource.key_pair() {
        if !recorded.public_key.is_empty() && recorded.public_key != key_pair.public_key() {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::PublicKeyMismatch,
                format!(
                    "seed in secret {} decodes to {}, status records {}; delete the secret to regenerate",
                    secret_key.name,
                    key_pair.public_key(),
                    recorded.public_key
                ),
            )));
        }
    }

    let mut desired = secrets::seed_secret(&*resource, &key_pair);
    if !existing.semantic_eq(&desired) {
        desired.metadata.resource_version = existing.metadata.resource_version;
        match ctx.store.update_secret(desired).await {
            Ok(_) => {}
            Err(StoreError::Immutable(name)) => {
                return Ok(Outcome::Blocked(ConditionError::failed(
                    Reason::InvalidSeedSecret,
                    format!("immutable secret {} is out of date; delete it to regenerate", name),
                )))
            }
            Err(err) => return Err(err.into()),
        }

        info!(secret = %secret_key, "Repaired seed secret");
        ctx.events.record(Event::normal(
            &*resource,
            EventReason::SeedSecretUpdated,
            format!("Updated seed secret {}", secret_key.name),
        ));
    } else {
        debug!(secret = %secret_key, "Seed secret up to date");
    }

    record_key_pair(resource, &key_pair);
    Ok(Outcome::Ready(key_pair))
}

fn record_key_pair<R: KeyPairable>(resource: &mut R, key_pair: &KeyPair) {
    let seed_secret_name = resource.seed_secret_name().to_string();
    resource.set_key_pair(KeyPairStatus {
        public_key: key_pair.public_key(),
        seed_secret_name,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingRecorder;
    use crate::reconcile::testing::{self, harness, reference};
    use crate::store::{MemoryStore, ObjectStore, Secret};
    use std::sync::Arc;
    use trustchain_core::{Account, KeyPrefix, ResourceKind};

    fn context() -> (Context, Arc<MemoryStore>, Arc<CollectingRecorder>) {
        let h = harness();
        (h.ctx, h.store, h.events)
    }

    fn account() -> Account {
        let mut account = testing::account("acme", reference(ResourceKind::Operator, "root"));
        account.metadata.uid = "uid-acme".into();
        account
    }

    #[tokio::test]
    async fn test_creates_seed_once() {
        let (ctx, store, events) = context();
        let mut account = account();

        let first = match ensure_seed(&ctx, &mut account).await.unwrap() {
            Outcome::Ready(kp) => kp,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(first.prefix(), KeyPrefix::Account);
        assert_eq!(account.status.key_pair.as_ref().unwrap().public_key, first.public_key());

        let writes = store.writes();
        let second = match ensure_seed(&ctx, &mut account).await.unwrap() {
            Outcome::Ready(kp) => kp,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(second.public_key(), first.public_key());
        assert_eq!(store.writes(), writes);
        assert_eq!(events.reasons_for(&account.metadata.key()), vec![EventReason::SeedSecretCreated]);
    }

    #[tokio::test]
    async fn test_missing_seed_field_is_blocked() {
        let (ctx, store, _) = context();
        store
            .create_secret(Secret::new("ns", "acme-seed").with_data("other", "x"))
            .await
            .unwrap();

        let mut account = account();
        match ensure_seed(&ctx, &mut account).await.unwrap() {
            Outcome::Blocked(err) => assert_eq!(err.reason, Reason::InvalidSeedSecret),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_prefix_is_blocked() {
        let (ctx, store, _) = context();
        let user_seed = KeyPair::create(KeyPrefix::User).seed();
        store
            .create_secret(Secret::new("ns", "acme-seed").with_data(SEED_KEY, user_seed))
            .await
            .unwrap();

        let mut account = account();
        match ensure_seed(&ctx, &mut account).await.unwrap() {
            Outcome::Blocked(err) => assert_eq!(err.reason, Reason::MalformedSeedSecret),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_public_key_mismatch_keeps_status() {
        let (ctx, store, _) = context();
        let mut account = account();
        let recorded = KeyPair::create(KeyPrefix::Account);
        account.status.key_pair = Some(KeyPairStatus {
            public_key: recorded.public_key(),
            seed_secret_name: "acme-seed".into(),
        });

        let other = KeyPair::create(KeyPrefix::Account);
        store
            .create_secret(secrets::seed_secret(&account, &other))
            .await
            .unwrap();

        match ensure_seed(&ctx, &mut account).await.unwrap() {
            Outcome::Blocked(err) => assert_eq!(err.reason, Reason::PublicKeyMismatch),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(account.status.key_pair.unwrap().public_key, recorded.public_key());
    }

    #[tokio::test]
    async fn test_store_failure_is_transient() {
        let (ctx, store, _) = context();
        store.fail_writes(Some(StoreError::Unavailable("down".into())));

        let mut account = account();
        assert!(ensure_seed(&ctx, &mut account).await.is_err());
        assert!(account.status.key_pair.is_none());
    }

    #[tokio::test]
    async fn test_repairs_ownership() {
        let (ctx, store, events) = context();
        let mut account = account();
        let kp = KeyPair::create(KeyPrefix::Account);

        let mut orphan = secrets::seed_secret(&account, &kp);
        orphan.metadata.owner_references.clear();
        store.create_secret(orphan).await.unwrap();

        assert!(ensure_seed(&ctx, &mut account).await.unwrap().is_ready());
        let repaired = store.get_secret(&ObjectKey::new("ns", "acme-seed")).await.unwrap();
        assert_eq!(repaired.metadata.owner_references.len(), 1);
        assert_eq!(events.reasons_for(&account.metadata.key()), vec![EventReason::SeedSecretUpdated]);
    }
}
