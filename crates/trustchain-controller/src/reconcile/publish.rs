//! Publication to the operator's account server
//!
//! Connections authenticate as a user of the operator's system account. The
//! system account itself is never pushed: loading its credentials is a
//! prerequisite of every push, so publishing it would be circular.

use std::future::Future;
use tracing::{debug, info};
use trustchain_core::{Account, ConditionType, HasConditions, ObjectKey, Operator, Reason, ResourceKind, User};
use trustchain_publish::{ConnectOptions, PublishError, SystemCredentials, TokenPublisher};

use super::token::TokenState;
use super::{downcast, found, try_ready, ConditionError, Context, Outcome};
use crate::error::{ControllerError, Result};
use crate::secrets::CREDS_KEY;

/// Whether `account` is the operator's designated system account
pub fn is_system_account(operator: &Operator, account: &ObjectKey) -> bool {
    operator
        .spec
        .system_account_ref
        .key_or(&operator.metadata.namespace)
        == *account
}

/// Key of the operator's system account user
pub fn system_user_key(operator: &Operator) -> ObjectKey {
    operator
        .spec
        .system_account_user_ref
        .key_or(&operator.metadata.namespace)
}

/// Run one account server call under the configured timeout
pub(crate) async fn bounded<T, F>(ctx: &Context, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, PublishError>>,
{
    match tokio::time::timeout(ctx.config.publish_timeout, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ControllerError::PublishTimeout(ctx.config.publish_timeout)),
    }
}

/// Credentials of the operator's system account user
pub async fn load_system_credentials(ctx: &Context, operator: &Operator) -> Result<Outcome<SystemCredentials>> {
    let user_key = system_user_key(operator);
    let user: User = match found(ctx.store.get(ResourceKind::User, &user_key).await)? {
        Some(user) => downcast(user, ResourceKind::User)?,
        None => {
            return Ok(Outcome::Blocked(ConditionError::unknown(
                Reason::SystemAccountNotReady,
                format!("system account user {} not found", user_key),
            )))
        }
    };

    let secret_key = ObjectKey::new(&user.metadata.namespace, &user.spec.credentials_secret_name);
    let secret = match found(ctx.store.get_secret(&secret_key).await)? {
        Some(secret) => secret,
        None => {
            return Ok(Outcome::Blocked(ConditionError::unknown(
                Reason::SystemAccountNotReady,
                format!("credentials of system account user {} not written yet", user_key),
            )))
        }
    };

    let creds = match secret.get(CREDS_KEY) {
        Some(creds) => creds,
        None => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::SystemAccountNotReady,
                format!("secret {} has no '{}' field", secret_key, CREDS_KEY),
            )))
        }
    };

    match SystemCredentials::from_creds(creds) {
        Ok(credentials) => Ok(Outcome::Ready(credentials)),
        Err(e) => Ok(Outcome::Blocked(ConditionError::failed(
            Reason::SystemAccountNotReady,
            format!("credentials in {} are unusable: {}", secret_key, e),
        ))),
    }
}

/// CA bundle named by the operator's TLS config, if any
pub async fn load_ca_bundle(ctx: &Context, operator: &Operator) -> Result<Outcome<Option<Vec<u8>>>> {
    let tls = match &operator.spec.tls_config {
        Some(tls) => tls,
        None => return Ok(Outcome::Ready(None)),
    };

    let selector = match &tls.ca_file {
        Some(selector) => selector,
        None => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::InvalidTlsConfig,
                "tls config names no CA file",
            )))
        }
    };

    let field = selector.key.as_deref().unwrap_or(&ctx.config.default_ca_key);
    let secret_key = ObjectKey::new(&operator.metadata.namespace, &selector.name);
    let secret = match found(ctx.store.get_secret(&secret_key).await)? {
        Some(secret) => secret,
        None => {
            return Ok(Outcome::Blocked(ConditionError::failed(
                Reason::InvalidTlsConfig,
                format!("CA secret {} not found", secret_key),
            )))
        }
    };

    match secret.get(field) {
        Some(pem) if !pem.trim().is_empty() => Ok(Outcome::Ready(Some(pem.as_bytes().to_vec()))),
        _ => Ok(Outcome::Blocked(ConditionError::failed(
            Reason::InvalidTlsConfig,
            format!("CA secret {} has no '{}' field", secret_key, field),
        ))),
    }
}

/// Connection options for the operator's account server
pub async fn connect_options(ctx: &Context, operator: &Operator) -> Result<Outcome<ConnectOptions>> {
    if operator.spec.account_server_url.is_empty() {
        return Ok(Outcome::Blocked(ConditionError::failed(
            Reason::JwtPushError,
            format!("operator {} has no account server URL", operator.metadata.key()),
        )));
    }

    let credentials = try_ready!(load_system_credentials(ctx, operator).await);
    let ca_bundle = try_ready!(load_ca_bundle(ctx, operator).await);

    let mut options = ConnectOptions::new(&operator.spec.account_server_url, credentials)
        .with_timeout(ctx.config.publish_timeout);
    if let Some(pem) = ca_bundle {
        options = options.with_ca_bundle(pem);
    }
    Ok(Outcome::Ready(options))
}

/// Open a publisher against the operator's account server
pub(crate) async fn connect(ctx: &Context, options: ConnectOptions) -> Result<Box<dyn TokenPublisher>> {
    let url = options.url.clone();
    let publisher = bounded(ctx, ctx.connector.connect(options)).await?;
    debug!(url = %url, publisher = publisher.description(), "Connected to account server");
    Ok(publisher)
}

/// Make sure the account server holds the account's current token
///
/// Pushes when the token changed in this pass or was never pushed. An
/// already-pushed token is replaced with an update.
pub async fn ensure_pushed(
    ctx: &Context,
    account: &Account,
    subject: &str,
    operator: &Operator,
    token: &TokenState,
) -> Result<Outcome<()>> {
    let account_key = account.metadata.key();
    if is_system_account(operator, &account_key) {
        debug!(account = %account_key, "System account is never pushed");
        return Ok(Outcome::Ready(()));
    }

    let pushed = account.is_condition_true(ConditionType::JwtPushed);
    if pushed && !token.changed {
        debug!(account = %account_key, "Token already published");
        return Ok(Outcome::Ready(()));
    }

    let options = try_ready!(connect_options(ctx, operator).await);
    let publisher = connect(ctx, options).await?;

    if pushed {
        bounded(ctx, publisher.update(subject, &token.token)).await?;
        info!(account = %account_key, subject, "Updated published token");
    } else {
        bounded(ctx, publisher.push(&token.token)).await?;
        info!(account = %account_key, subject, "Pushed token");
    }

    Ok(Outcome::Ready(()))
}
