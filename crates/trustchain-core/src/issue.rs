//! Canonical claim construction
//!
//! Claims are a pure function of the resource spec, the subject public key
//! and whatever the reconciler resolved (signing-key membership, system
//! account, issuer account). Lists are sorted so that the same inputs always
//! produce the same claims regardless of listing order.

use crate::claims::{AccountData, Claims, NatsClaims, OperatorData, UserData, CLAIMS_VERSION};
use crate::resource::{Account, Operator, SigningKeyEmbeddedStatus, User};

/// Public keys of a signing-key membership list, sorted and deduplicated
pub fn signing_key_public_keys(signing_keys: &[SigningKeyEmbeddedStatus]) -> Vec<String> {
    let mut keys: Vec<String> = signing_keys
        .iter()
        .map(|sk| sk.key_pair.public_key.clone())
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Claims for an operator's self-signed token
pub fn operator_claims(
    operator: &Operator,
    subject: &str,
    system_account: Option<String>,
    signing_keys: &[SigningKeyEmbeddedStatus],
) -> Claims {
    let account_server_url = Some(operator.spec.account_server_url.clone()).filter(|url| !url.is_empty());

    Claims::new(
        &operator.metadata.name,
        subject,
        NatsClaims::Operator(OperatorData {
            signing_keys: signing_key_public_keys(signing_keys),
            account_server_url,
            operator_service_urls: operator.spec.operator_service_urls.clone(),
            system_account,
            version: CLAIMS_VERSION,
        }),
    )
}

/// Claims for an account token
pub fn account_claims(account: &Account, subject: &str, signing_keys: &[SigningKeyEmbeddedStatus]) -> Claims {
    let spec = &account.spec;

    Claims::new(
        &account.metadata.name,
        subject,
        NatsClaims::Account(AccountData {
            imports: spec.imports.clone(),
            exports: spec.exports.clone(),
            limits: spec.limits.clone().unwrap_or_default(),
            signing_keys: signing_key_public_keys(signing_keys),
            default_permissions: spec.default_permissions.clone().unwrap_or_default(),
            version: CLAIMS_VERSION,
        }),
    )
}

/// Claims for a user token
///
/// `issuer_account` is the owning account's public key and must be set when
/// the user is signed by one of the account's signing keys rather than by the
/// account itself.
pub fn user_claims(user: &User, subject: &str, issuer_account: Option<String>) -> Claims {
    let spec = &user.spec;

    Claims::new(
        &user.metadata.name,
        subject,
        NatsClaims::User(UserData {
            permissions: spec.permissions.clone().unwrap_or_default(),
            limits: spec.limits.clone().unwrap_or_default(),
            bearer_token: spec.bearer_token,
            issuer_account,
            version: CLAIMS_VERSION,
        }),
    )
}
