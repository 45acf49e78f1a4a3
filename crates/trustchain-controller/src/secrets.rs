//! Desired state of the secrets the controller manages
//!
//! Every managed secret names its identity resource as controlling owner, so
//! the store collects it when the resource goes away and secret changes
//! re-enqueue the resource.

use trustchain_core::resource::{OwnerReference, API_VERSION};
use trustchain_core::{KeyPair, KeyPairable, Object, ResourceKind};

use crate::store::Secret;

/// Field holding the encoded seed
pub const SEED_KEY: &str = "seed";
/// Field holding the encoded public key (User seeds only)
pub const PUBLIC_KEY_KEY: &str = "public-key";
/// Field holding the signed token
pub const JWT_KEY: &str = "jwt";
/// Field holding the user credentials bundle
pub const CREDS_KEY: &str = "creds";

/// Controlling owner reference to an identity resource
pub fn owner_reference<R: Object + ?Sized>(resource: &R) -> OwnerReference {
    let meta = resource.metadata();
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: resource.kind().as_str().to_string(),
        name: meta.name.clone(),
        uid: meta.uid.clone(),
        controller: true,
    }
}

fn owned_secret<R: Object + ?Sized>(resource: &R, name: &str) -> Secret {
    let mut secret = Secret::new(&resource.metadata().namespace, name);
    secret.metadata.owner_references.push(owner_reference(resource));
    secret
}

/// Account and User seeds may never be rotated in place
pub fn seed_is_immutable(kind: ResourceKind) -> bool {
    matches!(kind, ResourceKind::Account | ResourceKind::User)
}

/// Seed secret for a resource's key pair
pub fn seed_secret<R: KeyPairable + ?Sized>(resource: &R, key_pair: &KeyPair) -> Secret {
    let mut secret = owned_secret(resource, resource.seed_secret_name())
        .with_data(SEED_KEY, key_pair.seed())
        .immutable(seed_is_immutable(resource.kind()));

    if resource.kind() == ResourceKind::User {
        secret = secret.with_data(PUBLIC_KEY_KEY, key_pair.public_key());
    }

    secret
}

/// Token secret; User tokens are immutable and replaced rather than updated
pub fn jwt_secret<R: Object + ?Sized>(resource: &R, name: &str, token: &str) -> Secret {
    owned_secret(resource, name)
        .with_data(JWT_KEY, token)
        .immutable(resource.kind() == ResourceKind::User)
}

/// Credentials bundle secret for a user
pub fn credentials_secret<R: Object + ?Sized>(resource: &R, name: &str, creds: &str) -> Secret {
    owned_secret(resource, name).with_data(CREDS_KEY, creds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustchain_core::{Account, KeyPrefix, ObjectMeta, User};

    #[test]
    fn test_user_seed_carries_public_key() {
        let mut user = User::default();
        user.metadata = ObjectMeta::new("ns", "alice");
        user.metadata.uid = "uid-1".into();
        user.spec.seed_secret_name = "alice-seed".into();

        let kp = KeyPair::create(KeyPrefix::User);
        let secret = seed_secret(&user, &kp);

        assert_eq!(secret.key().name, "alice-seed");
        assert_eq!(secret.get(SEED_KEY), Some(kp.seed().as_str()));
        assert_eq!(secret.get(PUBLIC_KEY_KEY), Some(kp.public_key().as_str()));
        assert!(secret.immutable);
        assert_eq!(secret.metadata.owner_references[0].uid, "uid-1");
        assert!(secret.metadata.owner_references[0].controller);
    }

    #[test]
    fn test_account_jwt_is_mutable() {
        let mut account = Account::default();
        account.metadata = ObjectMeta::new("ns", "acme");

        let secret = jwt_secret(&account, "acme-jwt", "a.b.c");
        assert!(!secret.immutable);
        assert_eq!(secret.get(JWT_KEY), Some("a.b.c"));
        assert!(secret.get(PUBLIC_KEY_KEY).is_none());
    }

    #[test]
    fn test_seed_immutability_by_kind() {
        assert!(seed_is_immutable(ResourceKind::Account));
        assert!(seed_is_immutable(ResourceKind::User));
        assert!(!seed_is_immutable(ResourceKind::Operator));
        assert!(!seed_is_immutable(ResourceKind::SigningKey));
    }
}
