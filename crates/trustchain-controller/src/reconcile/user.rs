//! User reconciliation
//!
//! Seed → issuer (Account or Account signing key) → account → token →
//! credentials bundle. User tokens are never published; clients present
//! them directly.

use tracing::{debug, info};
use trustchain_core::resource::InferredObjectReference;
use trustchain_core::{
    issue, token, Account, ConditionType, HasConditions, KeyPair, KeyPrefix, ObjectKey, Reason, ResourceKind, User,
};

use super::issuer::{load_issuer_seed, resolve_user_issuer, ResolvedIssuer};
use super::seed::ensure_seed;
use super::token::reconcile_token;
use super::{fetch, found, stage, ConditionError, Context, Outcome};
use crate::error::{Action, Result};
use crate::events::{Event, EventReason};
use crate::secrets;

/// Account owning a resolved user issuer
fn account_of(issuer: &ResolvedIssuer) -> Result<Outcome<Account>> {
    match Account::try_from(issuer.owner.clone()) {
        Ok(account) => Ok(Outcome::Ready(account)),
        Err(other) => Ok(Outcome::Blocked(ConditionError::failed(
            Reason::UnsupportedIssuer,
            format!("{} {} is not an account", other.kind(), other.key()),
        ))),
    }
}

/// Write the user's credentials bundle
pub async fn ensure_credentials(ctx: &Context, user: &User, jwt: &str, key_pair: &KeyPair) -> Result<Outcome<()>> {
    let name = &user.spec.credentials_secret_name;
    let secret_key = ObjectKey::new(&user.metadata.namespace, name);
    let creds = token::format_user_credentials(jwt, &key_pair.seed());
    let mut desired = secrets::credentials_secret(user, name, &creds);

    match found(ctx.store.get_secret(&secret_key).await)? {
        None => {
            ctx.store.create_secret(desired).await?;
            info!(secret = %secret_key, "Created credentials secret");
            ctx.events.record(Event::normal(
                user,
                EventReason::CredentialsSecretCreated,
                format!("Created credentials secret {}", name),
            ));
        }
        Some(existing) if !existing.semantic_eq(&desired) => {
            desired.metadata.resource_version = existing.metadata.resource_version;
            ctx.store.update_secret(desired).await?;
            info!(secret = %secret_key, "Updated credentials secret");
            ctx.events.record(Event::normal(
                user,
                EventReason::CredentialsSecretUpdated,
                format!("Updated credentials secret {}", name),
            ));
        }
        Some(_) => debug!(secret = %secret_key, "Credentials secret up to date"),
    }

    Ok(Outcome::Ready(()))
}

/// Reconcile one User
pub async fn reconcile_user(ctx: &Context, key: &ObjectKey) -> Result<Action> {
    let mut user: User = match fetch(ctx, ResourceKind::User, key).await? {
        Some(user) => user,
        None => {
            debug!(user = %key, "User no longer exists");
            return Ok(Action::await_change());
        }
    };

    if user.metadata.is_deleting() {
        return Ok(Action::await_change());
    }

    let snapshot = user.status.clone();
    user.initialize_conditions();

    let result = run(ctx, &mut user).await;

    if user.status != snapshot {
        ctx.store.update_status(user.into()).await?;
    }
    result
}

async fn run(ctx: &Context, user: &mut User) -> Result<Action> {
    let seeded = ensure_seed(ctx, user).await;
    let key_pair = stage!(user, ConditionType::SeedSecretReady, seeded);

    let resolved = resolve_user_issuer(ctx, &user.spec.issuer.reference, &user.metadata.namespace).await;
    let issuer = stage!(user, ConditionType::IssuerResolved, resolved);
    let loaded = load_issuer_seed(ctx, &issuer.signer_namespace, &issuer.signer, KeyPrefix::Account).await;
    let issuer_key_pair = stage!(user, ConditionType::IssuerResolved, loaded);

    let account = stage!(user, ConditionType::AccountResolved, account_of(&issuer));
    user.status.account_ref = Some(InferredObjectReference::from_key(&account.metadata.key()));

    let issuer_account = if issuer.via_signing_key {
        issuer.owner_public_key()
    } else {
        None
    };
    let claims = issue::user_claims(user, &key_pair.public_key(), issuer_account);
    let secret_name = user.spec.jwt_secret_name.clone();
    let reconciled = reconcile_token(ctx, &*user, &secret_name, &claims, &issuer_key_pair).await;
    let token = stage!(user, ConditionType::JwtSecretReady, reconciled);

    let written = ensure_credentials(ctx, user, &token.token, &key_pair).await;
    stage!(user, ConditionType::CredentialsSecretReady, written);

    Ok(Action::await_change())
}
