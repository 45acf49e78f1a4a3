//! Fixtures shared by the reconciler unit tests

use std::sync::Arc;
use trustchain_core::resource::{
    InferredObjectReference, IssuerReference, SigningKeyOwnerReference, SigningKeyType, API_VERSION,
};
use trustchain_core::{issue, token};
use trustchain_core::{
    Account, KeyPair, KeyPrefix, ObjectMeta, Operator, ResourceKind, SigningKey, TypedObjectReference, User,
};
use trustchain_publish::MockConnector;

use super::Context;
use crate::config::ControllerConfig;
use crate::events::CollectingRecorder;
use crate::secrets;
use crate::store::{MemoryStore, ObjectStore};

pub(crate) const NAMESPACE: &str = "ns";

pub(crate) struct Harness {
    pub ctx: Context,
    pub store: Arc<MemoryStore>,
    pub connector: MockConnector,
    pub events: Arc<CollectingRecorder>,
}

pub(crate) fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let connector = MockConnector::new();
    let events = Arc::new(CollectingRecorder::new());
    let ctx = Context::new(
        store.clone(),
        Arc::new(connector.clone()),
        events.clone(),
        ControllerConfig::default(),
    );

    Harness {
        ctx,
        store,
        connector,
        events,
    }
}

pub(crate) fn operator(name: &str, system_account: &str, system_user: &str) -> Operator {
    let mut operator = Operator::default();
    operator.metadata = ObjectMeta::new(NAMESPACE, name);
    operator.spec.seed_secret_name = format!("{}-seed", name);
    operator.spec.jwt_secret_name = format!("{}-jwt", name);
    operator.spec.account_server_url = "https://accounts.example.com".into();
    operator.spec.system_account_ref = InferredObjectReference::new(system_account);
    operator.spec.system_account_user_ref = InferredObjectReference::new(system_user);
    operator
}

pub(crate) fn account(name: &str, issuer: TypedObjectReference) -> Account {
    let mut account = Account::default();
    account.metadata = ObjectMeta::new(NAMESPACE, name);
    account.spec.issuer = IssuerReference::new(issuer);
    account.spec.seed_secret_name = format!("{}-seed", name);
    account.spec.jwt_secret_name = format!("{}-jwt", name);
    account
}

pub(crate) fn user(name: &str, issuer: TypedObjectReference) -> User {
    let mut user = User::default();
    user.metadata = ObjectMeta::new(NAMESPACE, name);
    user.spec.issuer = IssuerReference::new(issuer);
    user.spec.seed_secret_name = format!("{}-seed", name);
    user.spec.jwt_secret_name = format!("{}-jwt", name);
    user.spec.credentials_secret_name = format!("{}-creds", name);
    user
}

pub(crate) fn signing_key(name: &str, key_type: SigningKeyType, owner: &str) -> SigningKey {
    let mut signing_key = SigningKey::default();
    signing_key.metadata = ObjectMeta::new(NAMESPACE, name);
    signing_key.spec.key_type = key_type;
    signing_key.spec.seed_secret_name = format!("{}-seed", name);
    signing_key.spec.owner_ref = SigningKeyOwnerReference {
        api_version: API_VERSION.into(),
        kind: key_type.owner_kind().as_str().into(),
        name: owner.into(),
    };
    signing_key
}

pub(crate) fn reference(kind: ResourceKind, name: &str) -> TypedObjectReference {
    TypedObjectReference::new(kind, name)
}

/// Store the operator's system user together with its credentials secret
pub(crate) async fn install_system_user(store: &MemoryStore, operator: &Operator) -> KeyPair {
    let user_key = operator
        .spec
        .system_account_user_ref
        .key_or(&operator.metadata.namespace);
    let mut system_user = user(
        &user_key.name,
        reference(ResourceKind::Account, &operator.spec.system_account_ref.name),
    );
    system_user.metadata.namespace = user_key.namespace.clone();

    let key_pair = KeyPair::create(KeyPrefix::User);
    let claims = issue::user_claims(&system_user, &key_pair.public_key(), None);
    let (_, jwt) = token::encode(&claims, &KeyPair::create(KeyPrefix::Account)).unwrap();
    let creds = token::format_user_credentials(&jwt, &key_pair.seed());

    store
        .create_secret(secrets::credentials_secret(
            &system_user,
            &system_user.spec.credentials_secret_name,
            &creds,
        ))
        .await
        .unwrap();
    store.create(system_user.into()).await.unwrap();
    key_pair
}
