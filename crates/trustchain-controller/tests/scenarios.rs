//! Reconciliation scenarios for the whole trust chain
//!
//! These tests drive every reconciler against the in-memory store and the
//! mock account server:
//! - Convergence of Operator → Account → User and idempotent re-runs
//! - Token reissue only on semantic change
//! - Signing key membership changes
//! - Seed integrity
//! - Revocation before deletion
//! - Convergence driven only by watch re-enqueue mappings

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use trustchain_controller::secrets::{JWT_KEY, SEED_KEY};
use trustchain_controller::{
    handle, requests_for_account, requests_for_dependents, requests_for_secret, requests_for_signing_key, Action,
    CollectingRecorder, Context, ControllerConfig, EventReason, MemoryStore, ObjectStore, Request, Secret,
    StoreError,
};
use trustchain_core::claims::AccountLimits;
use trustchain_core::resource::{
    InferredObjectReference, IssuerReference, SigningKeyOwnerReference, SigningKeyType, API_VERSION,
};
use trustchain_core::{
    token, Account, ConditionStatus, ConditionType, HasConditions, KeyPair, KeyPrefix, LabelSelector,
    NatsClaims, ObjectKey, ObjectMeta, Operator, Reason, Resource, ResourceKind, SigningKey,
    TypedObjectReference, User,
};
use trustchain_publish::{MockConnector, PublishCall};

// =============================================================================
// Test Helpers
// =============================================================================

const NAMESPACE: &str = "tenants";

/// Passes needed for the slowest dependency chain to settle
const PASSES: usize = 4;

struct Cluster {
    ctx: Context,
    store: Arc<MemoryStore>,
    connector: MockConnector,
    events: Arc<CollectingRecorder>,
}

fn cluster() -> Cluster {
    let store = Arc::new(MemoryStore::new());
    let connector = MockConnector::new();
    let events = Arc::new(CollectingRecorder::new());
    let ctx = Context::new(
        store.clone(),
        Arc::new(connector.clone()),
        events.clone(),
        ControllerConfig::default(),
    );

    Cluster {
        ctx,
        store,
        connector,
        events,
    }
}

fn key(name: &str) -> ObjectKey {
    ObjectKey::new(NAMESPACE, name)
}

fn operator(name: &str) -> Operator {
    let mut operator = Operator::default();
    operator.metadata = ObjectMeta::new(NAMESPACE, name);
    operator.spec.seed_secret_name = format!("{}-seed", name);
    operator.spec.jwt_secret_name = format!("{}-jwt", name);
    operator.spec.account_server_url = "https://accounts.example.com".into();
    operator.spec.system_account_ref = InferredObjectReference::new("sys");
    operator.spec.system_account_user_ref = InferredObjectReference::new("sys-user");
    operator
}

fn account(name: &str, issuer: TypedObjectReference) -> Account {
    let mut account = Account::default();
    account.metadata = ObjectMeta::new(NAMESPACE, name);
    account.spec.issuer = IssuerReference::new(issuer);
    account.spec.seed_secret_name = format!("{}-seed", name);
    account.spec.jwt_secret_name = format!("{}-jwt", name);
    account
}

fn user(name: &str, issuer: TypedObjectReference) -> User {
    let mut user = User::default();
    user.metadata = ObjectMeta::new(NAMESPACE, name);
    user.spec.issuer = IssuerReference::new(issuer);
    user.spec.seed_secret_name = format!("{}-seed", name);
    user.spec.jwt_secret_name = format!("{}-jwt", name);
    user.spec.credentials_secret_name = format!("{}-creds", name);
    user
}

fn account_signing_key(name: &str, owner: &str, team: &str) -> SigningKey {
    let mut signing_key = SigningKey::default();
    signing_key.metadata = ObjectMeta::new(NAMESPACE, name);
    signing_key.metadata.labels.insert("team".into(), team.into());
    signing_key.spec.key_type = SigningKeyType::Account;
    signing_key.spec.seed_secret_name = format!("{}-seed", name);
    signing_key.spec.owner_ref = SigningKeyOwnerReference {
        api_version: API_VERSION.into(),
        kind: "Account".into(),
        name: owner.into(),
    };
    signing_key
}

/// Operator, system account, system user and one tenant account
async fn install_chain(c: &Cluster) {
    c.store.create(operator("root").into()).await.unwrap();
    for name in ["sys", "acme"] {
        c.store
            .create(account(name, TypedObjectReference::new(ResourceKind::Operator, "root")).into())
            .await
            .unwrap();
    }
    c.store
        .create(user("sys-user", TypedObjectReference::new(ResourceKind::Account, "sys")).into())
        .await
        .unwrap();
}

/// Reconcile every object, in dependency order, until the chain settles
async fn settle(c: &Cluster) {
    for _ in 0..PASSES {
        for kind in [
            ResourceKind::SigningKey,
            ResourceKind::Operator,
            ResourceKind::Account,
            ResourceKind::User,
        ] {
            for resource in c.store.list(kind, NAMESPACE).await.unwrap() {
                handle(&c.ctx, &Request::new(kind, resource.key())).await;
            }
        }
    }
}

/// Delivers requests the way a watch-driven controller would
///
/// Only requests produced by the watch mappings, plus the changed object
/// itself, are queued. Requeue actions wait in `delayed` until `advance`.
struct Driver<'a> {
    c: &'a Cluster,
    queue: VecDeque<Request>,
    delayed: Vec<Request>,
    resources: BTreeMap<(String, ObjectKey), Resource>,
    secrets: BTreeMap<ObjectKey, Secret>,
}

/// Bound on deliveries per drain, so a livelock fails instead of hanging
const MAX_DELIVERIES: usize = 500;

impl<'a> Driver<'a> {
    fn new(c: &'a Cluster) -> Self {
        Self {
            c,
            queue: VecDeque::new(),
            delayed: Vec::new(),
            resources: BTreeMap::new(),
            secrets: BTreeMap::new(),
        }
    }

    fn enqueue(&mut self, requests: impl IntoIterator<Item = Request>) {
        for request in requests {
            if !self.queue.contains(&request) {
                self.queue.push_back(request);
            }
        }
    }

    /// Turn store changes since the last look into watch events
    async fn observe(&mut self) {
        let namespaces = vec![NAMESPACE.to_string()];
        let mut current = BTreeMap::new();
        for kind in ResourceKind::ALL {
            for resource in self.c.store.list(kind, NAMESPACE).await.unwrap() {
                current.insert((kind.as_str().to_string(), resource.key()), resource);
            }
        }

        let mut changed = Vec::new();
        for (id, resource) in &current {
            match self.resources.get(id) {
                Some(seen) if seen.metadata().resource_version == resource.metadata().resource_version => {}
                _ => changed.push(resource.clone()),
            }
        }
        for (id, resource) in &self.resources {
            if !current.contains_key(id) {
                changed.push(resource.clone());
            }
        }

        for resource in changed {
            let mut requests = vec![Request::new(resource.kind(), resource.key())];
            match &resource {
                Resource::Account(account) => requests.extend(requests_for_account(account)),
                Resource::SigningKey(signing_key) => requests.extend(requests_for_signing_key(signing_key)),
                _ => {}
            }
            requests.extend(
                requests_for_dependents(self.c.store.as_ref(), &resource, &namespaces)
                    .await
                    .unwrap(),
            );
            self.enqueue(requests);
        }
        self.resources = current;

        let current: BTreeMap<ObjectKey, Secret> = self
            .c
            .store
            .list_secrets(NAMESPACE)
            .await
            .unwrap()
            .into_iter()
            .map(|secret| (secret.metadata.key(), secret))
            .collect();
        let mut requests = Vec::new();
        for (id, secret) in &current {
            match self.secrets.get(id) {
                Some(seen) if seen.metadata.resource_version == secret.metadata.resource_version => {}
                _ => requests.extend(requests_for_secret(secret)),
            }
        }
        for (id, secret) in &self.secrets {
            if !current.contains_key(id) {
                requests.extend(requests_for_secret(secret));
            }
        }
        self.enqueue(requests);
        self.secrets = current;
    }

    /// Deliver queued requests until no watch event is pending
    async fn drain(&mut self) {
        self.observe().await;
        let mut deliveries = 0;
        while let Some(request) = self.queue.pop_front() {
            deliveries += 1;
            assert!(deliveries <= MAX_DELIVERIES, "no quiescence, last request {}", request);

            let action = handle(&self.c.ctx, &request).await;
            if action.requeue_after().is_some() && !self.delayed.contains(&request) {
                self.delayed.push(request);
            }
            self.observe().await;
        }
    }

    /// Let every requeue delay elapse, then drain
    async fn advance(&mut self) {
        let delayed = std::mem::take(&mut self.delayed);
        self.enqueue(delayed);
        self.drain().await;
    }
}

async fn get<T>(c: &Cluster, kind: ResourceKind, name: &str) -> T
where
    T: TryFrom<Resource, Error = Resource>,
{
    let stored = c.store.get(kind, &key(name)).await.unwrap();
    match T::try_from(stored) {
        Ok(resource) => resource,
        Err(other) => panic!("unexpected kind {}", other.kind()),
    }
}

async fn secret(c: &Cluster, name: &str) -> Secret {
    c.store.get_secret(&key(name)).await.unwrap()
}

fn public_key(account: &Account) -> String {
    account.status.key_pair.clone().unwrap().public_key
}

// =============================================================================
// Convergence
// =============================================================================

#[tokio::test]
async fn test_chain_converges_and_settles() {
    let c = cluster();
    install_chain(&c).await;
    c.store
        .create(user("alice", TypedObjectReference::new(ResourceKind::Account, "acme")).into())
        .await
        .unwrap();

    settle(&c).await;

    let root: Operator = get(&c, ResourceKind::Operator, "root").await;
    let sys: Account = get(&c, ResourceKind::Account, "sys").await;
    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    let alice: User = get(&c, ResourceKind::User, "alice").await;
    assert!(root.is_ready(), "operator: {:?}", root.status.conditions);
    assert!(sys.is_ready(), "sys: {:?}", sys.status.conditions);
    assert!(acme.is_ready(), "acme: {:?}", acme.status.conditions);
    assert!(alice.is_ready(), "alice: {:?}", alice.status.conditions);

    let operator_claims = token::decode(secret(&c, "root-jwt").await.get(JWT_KEY).unwrap()).unwrap();
    match operator_claims.nats {
        NatsClaims::Operator(data) => assert_eq!(data.system_account, Some(public_key(&sys))),
        other => panic!("unexpected claims: {:?}", other),
    }

    let acme_claims = token::decode(secret(&c, "acme-jwt").await.get(JWT_KEY).unwrap()).unwrap();
    assert_eq!(acme_claims.iss, root.status.key_pair.clone().unwrap().public_key);
    assert_eq!(acme_claims.sub, public_key(&acme));

    let alice_claims = token::decode(secret(&c, "alice-jwt").await.get(JWT_KEY).unwrap()).unwrap();
    assert_eq!(alice_claims.iss, public_key(&acme));

    let writes = c.store.writes();
    let calls = c.connector.calls().len();
    settle(&c).await;
    assert_eq!(c.store.writes(), writes);
    assert_eq!(c.connector.calls().len(), calls);
}

#[tokio::test]
async fn test_system_account_is_never_pushed() {
    let c = cluster();
    install_chain(&c).await;
    settle(&c).await;

    let sys: Account = get(&c, ResourceKind::Account, "sys").await;
    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    assert!(sys.is_condition_true(ConditionType::JwtPushed));
    assert!(c.connector.published(&public_key(&sys)).is_none());
    assert!(c.connector.published(&public_key(&acme)).is_some());
    assert_eq!(c.connector.push_count(), 1);
}

#[tokio::test]
async fn test_account_waits_for_system_user() {
    let c = cluster();
    c.store.create(operator("root").into()).await.unwrap();
    for name in ["sys", "acme"] {
        c.store
            .create(account(name, TypedObjectReference::new(ResourceKind::Operator, "root")).into())
            .await
            .unwrap();
    }

    let mut driver = Driver::new(&c);
    driver.drain().await;

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    let pushed = acme.status.conditions.get(ConditionType::JwtPushed).unwrap();
    assert_eq!(pushed.status, ConditionStatus::Unknown);
    assert_eq!(pushed.reason, Reason::SystemAccountNotReady.as_str());
    assert!(acme.is_condition_true(ConditionType::JwtSecretReady));
    assert!(c.connector.calls().is_empty());
    assert!(driver
        .delayed
        .contains(&Request::new(ResourceKind::Account, key("acme"))));

    c.store
        .create(user("sys-user", TypedObjectReference::new(ResourceKind::Account, "sys")).into())
        .await
        .unwrap();
    driver.drain().await;
    let sys_user: User = get(&c, ResourceKind::User, "sys-user").await;
    assert!(sys_user.is_ready(), "sys-user: {:?}", sys_user.status.conditions);

    driver.advance().await;

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    assert!(acme.is_ready(), "acme: {:?}", acme.status.conditions);
    assert!(c.connector.published(&public_key(&acme)).is_some());
    assert!(driver.delayed.is_empty());
}

#[tokio::test]
async fn test_late_issuer_reenqueues_its_dependents() {
    let c = cluster();
    for name in ["sys", "acme"] {
        c.store
            .create(account(name, TypedObjectReference::new(ResourceKind::Operator, "root")).into())
            .await
            .unwrap();
    }
    c.store
        .create(user("alice", TypedObjectReference::new(ResourceKind::Account, "acme")).into())
        .await
        .unwrap();

    let mut driver = Driver::new(&c);
    driver.drain().await;

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    let issuer = acme.status.conditions.get(ConditionType::IssuerResolved).unwrap();
    assert_eq!(issuer.status, ConditionStatus::False);
    assert_eq!(issuer.reason, Reason::NotFound.as_str());

    c.store.create(operator("root").into()).await.unwrap();
    driver.drain().await;

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    assert!(acme.is_condition_true(ConditionType::IssuerResolved), "acme: {:?}", acme.status.conditions);
    assert!(acme.is_condition_true(ConditionType::JwtSecretReady));
    let alice: User = get(&c, ResourceKind::User, "alice").await;
    assert!(alice.is_condition_true(ConditionType::JwtSecretReady), "alice: {:?}", alice.status.conditions);
    let alice_claims = token::decode(secret(&c, "alice-jwt").await.get(JWT_KEY).unwrap()).unwrap();
    assert_eq!(alice_claims.iss, public_key(&acme));

    let operator: Operator = get(&c, ResourceKind::Operator, "root").await;
    let acme_claims = token::decode(secret(&c, "acme-jwt").await.get(JWT_KEY).unwrap()).unwrap();
    assert_eq!(acme_claims.iss, operator.status.key_pair.clone().unwrap().public_key);
}

// =============================================================================
// Token Reissue
// =============================================================================

#[tokio::test]
async fn test_older_issue_time_is_not_reissued() {
    let c = cluster();
    install_chain(&c).await;
    settle(&c).await;

    let operator_seed = secret(&c, "root-seed").await;
    let operator_key = KeyPair::from_seed(operator_seed.get(SEED_KEY).unwrap()).unwrap();

    let mut jwt_secret = secret(&c, "acme-jwt").await;
    let current = token::decode(jwt_secret.get(JWT_KEY).unwrap()).unwrap();
    let (_, older) = token::encode_at(&current, &operator_key, current.iat - 86_400).unwrap();
    jwt_secret.data.insert(JWT_KEY.into(), older.clone());
    c.store.update_secret(jwt_secret).await.unwrap();

    let pushes = c.connector.push_count();
    settle(&c).await;

    assert_eq!(secret(&c, "acme-jwt").await.get(JWT_KEY), Some(older.as_str()));
    assert_eq!(c.connector.push_count(), pushes);
}

#[tokio::test]
async fn test_spec_change_reissues_and_updates_remote() {
    let c = cluster();
    install_chain(&c).await;
    settle(&c).await;

    let before = secret(&c, "acme-jwt").await.get(JWT_KEY).unwrap().to_string();

    let mut acme: Account = get(&c, ResourceKind::Account, "acme").await;
    acme.spec.limits = Some(AccountLimits {
        conn: 100,
        ..AccountLimits::default()
    });
    c.store.update(acme.into()).await.unwrap();
    settle(&c).await;

    let after = secret(&c, "acme-jwt").await.get(JWT_KEY).unwrap().to_string();
    assert_ne!(before, after);
    match token::decode(&after).unwrap().nats {
        NatsClaims::Account(data) => assert_eq!(data.limits.conn, 100),
        other => panic!("unexpected claims: {:?}", other),
    }

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    let subject = public_key(&acme);
    assert!(c.connector.calls().contains(&PublishCall::Update {
        subject: subject.clone()
    }));
    assert_eq!(c.connector.published(&subject), Some(after));
    assert!(c
        .events
        .reasons_for(&key("acme"))
        .contains(&EventReason::JwtSecretUpdated));
}

// =============================================================================
// Signing Keys
// =============================================================================

#[tokio::test]
async fn test_signing_key_removal_narrows_account_claims() {
    let c = cluster();
    install_chain(&c).await;
    let mut acme: Account = get(&c, ResourceKind::Account, "acme").await;
    acme.spec.signing_keys_selector = Some(LabelSelector::with_labels([("team", "acme")]));
    c.store.update(acme.into()).await.unwrap();

    for name in ["acme-sk-a", "acme-sk-b"] {
        c.store
            .create(account_signing_key(name, "acme", "acme").into())
            .await
            .unwrap();
    }
    c.store
        .create(account_signing_key("other-sk", "acme", "other").into())
        .await
        .unwrap();
    settle(&c).await;

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    let members: Vec<&str> = acme.status.signing_keys.iter().map(|sk| sk.name.as_str()).collect();
    assert_eq!(members, vec!["acme-sk-a", "acme-sk-b"]);

    let sk_a: SigningKey = get(&c, ResourceKind::SigningKey, "acme-sk-a").await;
    let sk_a_public = sk_a.status.key_pair.clone().unwrap().public_key;

    c.store
        .delete(ResourceKind::SigningKey, &key("acme-sk-b"))
        .await
        .unwrap();
    settle(&c).await;

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    let members: Vec<&str> = acme.status.signing_keys.iter().map(|sk| sk.name.as_str()).collect();
    assert_eq!(members, vec!["acme-sk-a"]);

    let claims = token::decode(secret(&c, "acme-jwt").await.get(JWT_KEY).unwrap()).unwrap();
    match claims.nats {
        NatsClaims::Account(data) => assert_eq!(data.signing_keys, vec![sk_a_public]),
        other => panic!("unexpected claims: {:?}", other),
    }

    let changes = c
        .events
        .reasons_for(&key("acme"))
        .into_iter()
        .filter(|reason| *reason == EventReason::SigningKeysChanged)
        .count();
    assert_eq!(changes, 2);
}

#[tokio::test]
async fn test_user_signed_through_account_signing_key() {
    let c = cluster();
    install_chain(&c).await;
    c.store
        .create(account_signing_key("acme-sk", "acme", "acme").into())
        .await
        .unwrap();
    c.store
        .create(user("bob", TypedObjectReference::new(ResourceKind::SigningKey, "acme-sk")).into())
        .await
        .unwrap();
    settle(&c).await;

    let bob: User = get(&c, ResourceKind::User, "bob").await;
    assert!(bob.is_ready(), "bob: {:?}", bob.status.conditions);
    assert_eq!(bob.status.account_ref.as_ref().unwrap().name, "acme");

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    let sk: SigningKey = get(&c, ResourceKind::SigningKey, "acme-sk").await;
    let claims = token::decode(secret(&c, "bob-jwt").await.get(JWT_KEY).unwrap()).unwrap();
    assert_eq!(claims.iss, sk.status.key_pair.clone().unwrap().public_key);
    match claims.nats {
        NatsClaims::User(data) => assert_eq!(data.issuer_account, Some(public_key(&acme))),
        other => panic!("unexpected claims: {:?}", other),
    }
}

// =============================================================================
// Seed Integrity
// =============================================================================

#[tokio::test]
async fn test_swapped_seed_blocks_reissue() {
    let c = cluster();
    install_chain(&c).await;
    settle(&c).await;

    let jwt_before = secret(&c, "acme-jwt").await;
    let acme_seed = secret(&c, "acme-seed").await;
    c.store.delete_secret(&key("acme-seed")).await.unwrap();
    let mut swapped = acme_seed.clone();
    swapped
        .data
        .insert(SEED_KEY.into(), KeyPair::create(KeyPrefix::Account).seed());
    swapped.metadata.resource_version = 0;
    c.store.create_secret(swapped).await.unwrap();

    let pushes = c.connector.push_count();
    settle(&c).await;

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    let seed = acme.status.conditions.get(ConditionType::SeedSecretReady).unwrap();
    assert_eq!(seed.status, ConditionStatus::False);
    assert_eq!(seed.reason, Reason::PublicKeyMismatch.as_str());
    assert!(!acme.is_ready());
    assert_eq!(secret(&c, "acme-jwt").await, jwt_before);
    assert_eq!(c.connector.push_count(), pushes);
}

// =============================================================================
// Finalization
// =============================================================================

#[tokio::test]
async fn test_deletion_waits_for_remote_revocation() {
    let c = cluster();
    install_chain(&c).await;
    settle(&c).await;

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    let subject = public_key(&acme);
    c.connector.fail_delete("account server unavailable");
    c.store.delete(ResourceKind::Account, &key("acme")).await.unwrap();

    let request = Request::new(ResourceKind::Account, key("acme"));
    let action = handle(&c.ctx, &request).await;
    assert_eq!(action, Action::requeue(c.ctx.config.error_requeue));

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    assert!(acme.metadata.is_deleting());
    assert!(c.connector.published(&subject).is_some());
    assert!(c.store.get_secret(&key("acme-seed")).await.is_ok());

    c.connector.clear_failures();
    assert_eq!(handle(&c.ctx, &request).await, Action::await_change());

    assert!(c
        .store
        .get(ResourceKind::Account, &key("acme"))
        .await
        .unwrap_err()
        .is_not_found());
    assert!(c.connector.published(&subject).is_none());
    assert!(c.store.get_secret(&key("acme-jwt")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_unpublished_account_deletes_without_revocation() {
    let c = cluster();
    c.store.create(operator("root").into()).await.unwrap();
    c.store
        .create(account("acme", TypedObjectReference::new(ResourceKind::Operator, "root")).into())
        .await
        .unwrap();
    settle(&c).await;

    let acme: Account = get(&c, ResourceKind::Account, "acme").await;
    assert!(!acme.is_condition_true(ConditionType::JwtPushed));

    c.store.delete(ResourceKind::Account, &key("acme")).await.unwrap();
    handle(&c.ctx, &Request::new(ResourceKind::Account, key("acme"))).await;

    assert!(c.store.get(ResourceKind::Account, &key("acme")).await.is_err());
    assert_eq!(c.connector.delete_count(), 0);
}

// =============================================================================
// Failure Policy and Watches
// =============================================================================

#[tokio::test]
async fn test_write_conflict_requeues_with_fixed_delay() {
    let c = cluster();
    c.store
        .create(account("acme", TypedObjectReference::new(ResourceKind::Operator, "root")).into())
        .await
        .unwrap();
    c.store
        .fail_writes(Some(StoreError::Conflict("Account tenants/acme".into())));

    let action = handle(&c.ctx, &Request::new(ResourceKind::Account, key("acme"))).await;
    assert_eq!(action, Action::requeue(Duration::from_secs(30)));
    assert_eq!(action.requeue_after(), Some(c.ctx.config.conflict_requeue));
}

#[tokio::test]
async fn test_dependencies_map_back_to_their_readers() {
    let c = cluster();
    install_chain(&c).await;
    c.store
        .create(account_signing_key("acme-sk", "acme", "acme").into())
        .await
        .unwrap();
    settle(&c).await;

    assert_eq!(
        requests_for_secret(&secret(&c, "acme-jwt").await),
        vec![Request::new(ResourceKind::Account, key("acme"))]
    );
    assert_eq!(
        requests_for_secret(&secret(&c, "sys-user-creds").await),
        vec![Request::new(ResourceKind::User, key("sys-user"))]
    );

    let sk: SigningKey = get(&c, ResourceKind::SigningKey, "acme-sk").await;
    assert_eq!(
        requests_for_signing_key(&sk),
        vec![Request::new(ResourceKind::Account, key("acme"))]
    );
}
