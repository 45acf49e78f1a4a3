//! Account reconciliation
//!
//! Seed → issuer (Operator or Operator signing key) → operator → signing
//! keys → token → publication. Accounts carry a finalizer so their published
//! token is revoked before the object disappears.

use tracing::{debug, info};
use trustchain_core::resource::InferredObjectReference;
use trustchain_core::{
    issue, Account, ConditionStatus, ConditionType, HasConditions, KeyPrefix, ObjectKey, Operator, Reason,
    ResourceKind,
};

use super::finalize::{finalize_account, ACCOUNT_FINALIZER};
use super::issuer::{load_issuer_seed, resolve_account_issuer, ResolvedIssuer};
use super::publish::ensure_pushed;
use super::seed::ensure_seed;
use super::signing_keys::resolve_signing_keys;
use super::token::reconcile_token;
use super::{downcast, fetch, stage, ConditionError, Context, Outcome};
use crate::error::{Action, Result};

/// Operator owning a resolved account issuer
fn operator_of(issuer: &ResolvedIssuer) -> Result<Outcome<Operator>> {
    match Operator::try_from(issuer.owner.clone()) {
        Ok(operator) => Ok(Outcome::Ready(operator)),
        Err(other) => Ok(Outcome::Blocked(ConditionError::failed(
            Reason::UnsupportedIssuer,
            format!("{} {} is not an operator", other.kind(), other.key()),
        ))),
    }
}

/// Reconcile one Account
pub async fn reconcile_account(ctx: &Context, key: &ObjectKey) -> Result<Action> {
    let mut account: Account = match fetch(ctx, ResourceKind::Account, key).await? {
        Some(account) => account,
        None => {
            debug!(account = %key, "Account no longer exists");
            return Ok(Action::await_change());
        }
    };

    if account.metadata.is_deleting() {
        if account.metadata.has_finalizer(ACCOUNT_FINALIZER) {
            finalize_account(ctx, &account).await?;
            account.metadata.remove_finalizer(ACCOUNT_FINALIZER);
            ctx.store.update(account.into()).await?;
            info!(account = %key, "Finalized account");
        }
        return Ok(Action::await_change());
    }

    if account.metadata.add_finalizer(ACCOUNT_FINALIZER) {
        let updated = ctx.store.update(account.into()).await?;
        account = downcast(updated, ResourceKind::Account)?;
        debug!(account = %key, "Added finalizer");
    }

    let snapshot = account.status.clone();
    account.initialize_conditions();

    let result = run(ctx, &mut account).await;

    if account.status != snapshot {
        ctx.store.update_status(account.into()).await?;
    }
    result
}

async fn run(ctx: &Context, account: &mut Account) -> Result<Action> {
    let seeded = ensure_seed(ctx, account).await;
    let key_pair = stage!(account, ConditionType::SeedSecretReady, seeded);

    let resolved = resolve_account_issuer(ctx, &account.spec.issuer.reference, &account.metadata.namespace).await;
    let issuer = stage!(account, ConditionType::IssuerResolved, resolved);
    let loaded = load_issuer_seed(ctx, &issuer.signer_namespace, &issuer.signer, KeyPrefix::Operator).await;
    let issuer_key_pair = stage!(account, ConditionType::IssuerResolved, loaded);

    let operator = stage!(account, ConditionType::OperatorResolved, operator_of(&issuer));
    account.status.operator_ref = Some(InferredObjectReference::from_key(&operator.metadata.key()));

    let selected = resolve_signing_keys(
        ctx,
        &*account,
        account.spec.signing_keys_selector.as_ref(),
        &account.status.signing_keys,
    )
    .await;
    account.status.signing_keys = stage!(account, ConditionType::SigningKeysUpdated, selected);

    let public_key = key_pair.public_key();
    let claims = issue::account_claims(account, &public_key, &account.status.signing_keys);
    let secret_name = account.spec.jwt_secret_name.clone();
    let reconciled = reconcile_token(ctx, &*account, &secret_name, &claims, &issuer_key_pair).await;
    let token = stage!(account, ConditionType::JwtSecretReady, reconciled);

    match ensure_pushed(ctx, account, &public_key, &operator, &token).await {
        Ok(Outcome::Ready(())) => account.mark_true(ConditionType::JwtPushed),
        Ok(Outcome::Blocked(blocked)) => {
            info!(condition = %ConditionType::JwtPushed, reason = %blocked.reason, "{}", blocked.message);
            blocked.apply(account, ConditionType::JwtPushed);
            // System user credentials are written under another owner and
            // re-enqueue nothing here, so waiting on them polls
            if blocked.status == ConditionStatus::Unknown {
                return Ok(Action::requeue(ctx.config.error_requeue));
            }
            return Ok(Action::await_change());
        }
        Err(err) => {
            account.mark_false(ConditionType::JwtPushed, Reason::JwtPushError, err.to_string());
            return Err(err);
        }
    }

    Ok(Action::await_change())
}
