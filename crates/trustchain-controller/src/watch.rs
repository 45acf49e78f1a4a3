//! Watch re-enqueue mapping
//!
//! Reconcilers read other objects without locking. They converge because a
//! change to a dependency re-enqueues the objects that read it:
//!
//! - a SigningKey re-enqueues the owner recorded in its status
//! - a managed Secret re-enqueues the identity resource controlling it
//! - an Account re-enqueues the Operator it resolved, which reads it as
//!   system account
//! - an issuer re-enqueues the Accounts and Users naming it, and an Operator
//!   or Account re-enqueues the SigningKeys naming it as owner

use trustchain_core::resource::API_VERSION;
use trustchain_core::{Account, ObjectKey, Resource, ResourceKind, SigningKey, TypedObjectReference, User};

use crate::store::{ObjectStore, Secret, StoreError};

/// One unit of work for the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    pub kind: ResourceKind,
    pub key: ObjectKey,
}

impl Request {
    pub fn new(kind: ResourceKind, key: ObjectKey) -> Self {
        Self { kind, key }
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

/// Owner to re-enqueue when a signing key changes
pub fn requests_for_signing_key(signing_key: &SigningKey) -> Vec<Request> {
    let owner_ref = match &signing_key.status.owner_ref {
        Some(owner_ref) => owner_ref,
        None => return Vec::new(),
    };

    let kind = match owner_ref.kind.as_str() {
        "Account" => ResourceKind::Account,
        "Operator" => ResourceKind::Operator,
        _ => return Vec::new(),
    };

    vec![Request::new(kind, owner_ref.key_or(&signing_key.metadata.namespace))]
}

/// Identity resource to re-enqueue when a managed secret changes
pub fn requests_for_secret(secret: &Secret) -> Vec<Request> {
    let owner = match secret.metadata.controller_owner() {
        Some(owner) if owner.api_version == API_VERSION => owner,
        _ => return Vec::new(),
    };

    ResourceKind::ALL
        .into_iter()
        .find(|kind| kind.as_str() == owner.kind)
        .map(|kind| Request::new(kind, ObjectKey::new(&secret.metadata.namespace, &owner.name)))
        .into_iter()
        .collect()
}

/// Operator to re-enqueue when an account it may depend on changes
pub fn requests_for_account(account: &Account) -> Vec<Request> {
    account
        .status
        .operator_ref
        .as_ref()
        .map(|operator_ref| {
            Request::new(
                ResourceKind::Operator,
                operator_ref.key_or(&account.metadata.namespace),
            )
        })
        .into_iter()
        .collect()
}

fn names(reference: &TypedObjectReference, namespace: &str, kind: ResourceKind, key: &ObjectKey) -> bool {
    reference.kind == kind.as_str() && reference.key_or(namespace) == *key
}

/// Readers to re-enqueue when an issuer or signing key owner changes
///
/// Dependents are searched in `namespaces`, the namespaces being watched.
pub async fn requests_for_dependents(
    store: &dyn ObjectStore,
    changed: &Resource,
    namespaces: &[String],
) -> Result<Vec<Request>, StoreError> {
    let kind = changed.kind();
    let key = changed.key();
    let mut requests = Vec::new();

    for namespace in namespaces {
        for resource in store.list(ResourceKind::Account, namespace).await? {
            if let Ok(account) = Account::try_from(resource) {
                if names(&account.spec.issuer.reference, namespace, kind, &key) {
                    requests.push(Request::new(ResourceKind::Account, account.metadata.key()));
                }
            }
        }

        for resource in store.list(ResourceKind::User, namespace).await? {
            if let Ok(user) = User::try_from(resource) {
                if names(&user.spec.issuer.reference, namespace, kind, &key) {
                    requests.push(Request::new(ResourceKind::User, user.metadata.key()));
                }
            }
        }

        if matches!(kind, ResourceKind::Operator | ResourceKind::Account) {
            for resource in store.list(ResourceKind::SigningKey, namespace).await? {
                if let Ok(signing_key) = SigningKey::try_from(resource) {
                    let owner = &signing_key.spec.owner_ref;
                    if owner.kind == kind.as_str() && ObjectKey::new(namespace, &owner.name) == key {
                        requests.push(Request::new(ResourceKind::SigningKey, signing_key.metadata.key()));
                    }
                }
            }
        }
    }

    Ok(requests)
}
