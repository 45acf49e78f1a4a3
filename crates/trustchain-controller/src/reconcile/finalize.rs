//! Account finalization
//!
//! A published account token is revoked on the account server before the
//! Account leaves the store. Revocation is skipped, and deletion allowed,
//! whenever there is nothing that could have been published or nobody left
//! to revoke it with.

use tracing::info;
use trustchain_core::{Account, ConditionType, HasConditions, KeyPrefix, Operator, ResourceKind};

use super::issuer::load_issuer_seed;
use super::publish::{bounded, connect, connect_options, is_system_account, system_user_key};
use super::{downcast, found, Context, Outcome};
use crate::error::{ControllerError, Result};

/// Finalizer guarding remote revocation of an Account token
pub const ACCOUNT_FINALIZER: &str = "accounts.nats.io/finalizer";

/// Revoke the account's token on its operator's account server
///
/// Returns Ok when revocation succeeded or was skipped; the caller may then
/// drop the finalizer. Any error leaves the finalizer in place.
pub async fn finalize_account(ctx: &Context, account: &Account) -> Result<()> {
    let key = account.metadata.key();

    if !account.is_condition_true(ConditionType::JwtSecretReady) {
        info!(account = %key, "Token was never written, skipping revocation");
        return Ok(());
    }
    if !account.is_condition_true(ConditionType::JwtPushed) {
        info!(account = %key, "Token was never pushed, skipping revocation");
        return Ok(());
    }

    let public_key = match &account.status.key_pair {
        Some(key_pair) => key_pair.public_key.clone(),
        None => return Ok(()),
    };

    let operator_key = match &account.status.operator_ref {
        Some(operator_ref) => operator_ref.key_or(&account.metadata.namespace),
        None => {
            info!(account = %key, "No resolved operator, skipping revocation");
            return Ok(());
        }
    };

    let operator: Operator = match found(ctx.store.get(ResourceKind::Operator, &operator_key).await)? {
        Some(operator) => downcast(operator, ResourceKind::Operator)?,
        None => {
            info!(account = %key, operator = %operator_key, "Operator is gone, treating token as revoked");
            return Ok(());
        }
    };

    if is_system_account(&operator, &key) {
        info!(account = %key, "System account token is not revoked");
        return Ok(());
    }

    let system_user = system_user_key(&operator);
    if found(ctx.store.get(ResourceKind::User, &system_user).await)?.is_none() {
        info!(account = %key, user = %system_user, "System account user is gone, treating token as revoked");
        return Ok(());
    }

    let signer = operator.status.key_pair.as_ref().ok_or_else(|| {
        ControllerError::Finalize(format!("operator {} has no recorded key pair", operator_key))
    })?;
    let operator_key_pair =
        match load_issuer_seed(ctx, &operator.metadata.namespace, signer, KeyPrefix::Operator).await? {
            Outcome::Ready(key_pair) => key_pair,
            Outcome::Blocked(blocked) => return Err(ControllerError::Finalize(blocked.to_string())),
        };

    let options = match connect_options(ctx, &operator).await? {
        Outcome::Ready(options) => options.with_operator(operator_key_pair),
        Outcome::Blocked(blocked) => return Err(ControllerError::Finalize(blocked.to_string())),
    };

    let publisher = connect(ctx, options).await?;
    match bounded(ctx, publisher.delete(&public_key)).await {
        Ok(()) => info!(account = %key, public_key = %public_key, "Revoked account token"),
        Err(ControllerError::Publish(e)) if e.is_not_found() => {
            info!(account = %key, public_key = %public_key, "Account token already revoked")
        }
        Err(e) => return Err(e),
    }

    Ok(())
}
