//! Operator reconciliation
//!
//! The operator is the root of trust and signs its own token, so there is no
//! issuer to resolve. Its claims name the system account's public key, which
//! means the system account must have a seed before the operator can
//! converge.

use tracing::debug;
use trustchain_core::resource::InferredObjectReference;
use trustchain_core::{issue, Account, ConditionType, HasConditions, ObjectKey, Operator, Reason, ResourceKind};

use super::seed::ensure_seed;
use super::signing_keys::resolve_signing_keys;
use super::token::reconcile_token;
use super::{fetch, stage, ConditionError, Context, Outcome};
use crate::error::{Action, Result};

/// System account as seen by its operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemAccount {
    pub key: ObjectKey,
    pub public_key: String,
}

/// Resolve the operator's system account
///
/// The account only needs a seed: its token is signed by this operator, so
/// waiting for it to be fully ready would deadlock.
pub async fn resolve_system_account(ctx: &Context, operator: &Operator) -> Result<Outcome<SystemAccount>> {
    let key = operator
        .spec
        .system_account_ref
        .key_or(&operator.metadata.namespace);

    let account: Account = match fetch(ctx, ResourceKind::Account, &key).await? {
        Some(account) => account,
        None => {
            return Ok(Outcome::Blocked(ConditionError::unknown(
                Reason::NotFound,
                format!("system account {} not found", key),
            )))
        }
    };

    match &account.status.key_pair {
        Some(key_pair) if account.is_condition_true(ConditionType::SeedSecretReady) => {
            Ok(Outcome::Ready(SystemAccount {
                key,
                public_key: key_pair.public_key.clone(),
            }))
        }
        _ => Ok(Outcome::Blocked(ConditionError::unknown(
            Reason::SystemAccountNotReady,
            format!("system account {} has no seed yet", key),
        ))),
    }
}

/// Reconcile one Operator
pub async fn reconcile_operator(ctx: &Context, key: &ObjectKey) -> Result<Action> {
    let mut operator: Operator = match fetch(ctx, ResourceKind::Operator, key).await? {
        Some(operator) => operator,
        None => {
            debug!(operator = %key, "Operator no longer exists");
            return Ok(Action::await_change());
        }
    };

    if operator.metadata.is_deleting() {
        return Ok(Action::await_change());
    }

    let snapshot = operator.status.clone();
    operator.initialize_conditions();

    let result = run(ctx, &mut operator).await;

    if operator.status != snapshot {
        ctx.store.update_status(operator.into()).await?;
    }
    result
}

async fn run(ctx: &Context, operator: &mut Operator) -> Result<Action> {
    let seeded = ensure_seed(ctx, operator).await;
    let key_pair = stage!(operator, ConditionType::SeedSecretReady, seeded);

    let selected = resolve_signing_keys(
        ctx,
        &*operator,
        operator.spec.signing_keys_selector.as_ref(),
        &operator.status.signing_keys,
    )
    .await;
    operator.status.signing_keys = stage!(operator, ConditionType::SigningKeysUpdated, selected);

    let resolved = resolve_system_account(ctx, operator).await;
    let system_account = stage!(operator, ConditionType::SystemAccountResolved, resolved);
    operator.status.resolved_system_account = Some(InferredObjectReference::from_key(&system_account.key));

    let claims = issue::operator_claims(
        operator,
        &key_pair.public_key(),
        Some(system_account.public_key),
        &operator.status.signing_keys,
    );
    let secret_name = operator.spec.jwt_secret_name.clone();
    let reconciled = reconcile_token(ctx, &*operator, &secret_name, &claims, &key_pair).await;
    stage!(operator, ConditionType::JwtSecretReady, reconciled);

    Ok(Action::await_change())
}
