//! Reconciliation engine
//!
//! Each kind runs the same pipeline: Seed → Issuer → kind-specific
//! resolution → SigningKeys (Account/Operator) → Token → Publication
//! (Account). Every stage returns a [`Outcome`]:
//!
//! - `Ready(value)`: the stage's condition is marked True and the pipeline continues
//! - `Blocked(ConditionError)`: the condition records why, the pipeline stops and
//!   nothing is retried until a watched object changes
//! - `Err(ControllerError)`: transient failure, the condition goes Unknown and the
//!   error is surfaced for backoff
//!
//! Status is written once at the end of a pass, and only if it changed.

pub mod account;
pub mod finalize;
pub mod issuer;
pub mod operator;
pub mod publish;
pub mod seed;
pub mod signing_key;
pub mod signing_keys;
pub mod token;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use tracing::{info_span, warn, Instrument};
use trustchain_core::{ConditionStatus, ConditionType, HasConditions, ObjectKey, Reason, Resource, ResourceKind};
use trustchain_publish::Connector;

use crate::config::ControllerConfig;
use crate::error::{error_policy, Action, Result};
use crate::events::EventRecorder;
use crate::registry::KindRegistry;
use crate::store::{ObjectStore, StoreError};
use crate::watch::Request;

/// Shared dependencies of all reconcilers
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn ObjectStore>,
    pub registry: KindRegistry,
    pub connector: Arc<dyn Connector>,
    pub events: Arc<dyn EventRecorder>,
    pub config: ControllerConfig,
}

impl Context {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        connector: Arc<dyn Connector>,
        events: Arc<dyn EventRecorder>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            registry: KindRegistry::standard(),
            connector,
            events,
            config,
        }
    }

    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }
}

/// Why a stage could not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionError {
    /// False for problems needing intervention, Unknown while waiting on a dependency
    pub status: ConditionStatus,
    pub reason: Reason,
    pub message: String,
}

impl ConditionError {
    /// Needs a spec or secret change
    pub fn failed(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            status: ConditionStatus::False,
            reason,
            message: message.into(),
        }
    }

    /// Waiting on another object
    pub fn unknown(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            status: ConditionStatus::Unknown,
            reason,
            message: message.into(),
        }
    }

    /// Record this error on one condition of a resource
    pub fn apply<R: HasConditions>(&self, resource: &mut R, condition: ConditionType) {
        match self.status {
            ConditionStatus::Unknown => resource.mark_unknown(condition, self.reason, self.message.clone()),
            _ => resource.mark_false(condition, self.reason, self.message.clone()),
        }
    }
}

impl std::fmt::Display for ConditionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Result of a pipeline stage that did not fail transiently
#[derive(Debug)]
pub enum Outcome<T> {
    Ready(T),
    Blocked(ConditionError),
}

impl<T> Outcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Ready(value) => Outcome::Ready(f(value)),
            Outcome::Blocked(err) => Outcome::Blocked(err),
        }
    }
}

/// Run one stage against a condition
///
/// Ready marks the condition True and yields the value. Blocked records the
/// condition and ends the pass without error. Err marks the condition Unknown
/// and propagates.
macro_rules! stage {
    ($resource:expr, $condition:expr, $result:expr) => {
        match $result {
            Ok($crate::reconcile::Outcome::Ready(value)) => {
                trustchain_core::HasConditions::mark_true($resource, $condition);
                value
            }
            Ok($crate::reconcile::Outcome::Blocked(blocked)) => {
                tracing::info!(condition = %$condition, reason = %blocked.reason, "{}", blocked.message);
                blocked.apply($resource, $condition);
                return Ok($crate::error::Action::await_change());
            }
            Err(err) => {
                trustchain_core::HasConditions::mark_unknown(
                    $resource,
                    $condition,
                    trustchain_core::Reason::UnknownError,
                    err.to_string(),
                );
                return Err(err);
            }
        }
    };
}

pub(crate) use stage;

/// Unwrap a Ready value inside a function that itself returns an Outcome,
/// passing Blocked through unchanged
macro_rules! try_ready {
    ($result:expr) => {
        match $result? {
            $crate::reconcile::Outcome::Ready(value) => value,
            $crate::reconcile::Outcome::Blocked(blocked) => {
                return Ok($crate::reconcile::Outcome::Blocked(blocked))
            }
        }
    };
}

pub(crate) use try_ready;

/// Narrow a stored resource to the kind that was asked for
pub(crate) fn downcast<T>(resource: Resource, expected: ResourceKind) -> std::result::Result<T, StoreError>
where
    T: TryFrom<Resource, Error = Resource>,
{
    T::try_from(resource).map_err(|other| {
        StoreError::Invalid(format!("expected {}, got {} {}", expected, other.kind(), other.key()))
    })
}

/// Map a store lookup to Some/None, keeping other errors
pub(crate) fn found<T>(result: std::result::Result<T, StoreError>) -> std::result::Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Fetch an object of a known kind, None if it does not exist
pub(crate) async fn fetch<T>(
    ctx: &Context,
    kind: ResourceKind,
    key: &ObjectKey,
) -> std::result::Result<Option<T>, StoreError>
where
    T: TryFrom<Resource, Error = Resource>,
{
    match found(ctx.store.get(kind, key).await)? {
        Some(resource) => downcast(resource, kind).map(Some),
        None => Ok(None),
    }
}

/// Reconcile the object a request names
pub async fn reconcile(ctx: &Context, request: &Request) -> Result<Action> {
    let span = info_span!(
        "reconcile",
        kind = %request.kind,
        namespace = %request.key.namespace,
        name = %request.key.name
    );

    async {
        match request.kind {
            ResourceKind::Operator => operator::reconcile_operator(ctx, &request.key).await,
            ResourceKind::Account => account::reconcile_account(ctx, &request.key).await,
            ResourceKind::User => user::reconcile_user(ctx, &request.key).await,
            ResourceKind::SigningKey => signing_key::reconcile_signing_key(ctx, &request.key).await,
        }
    }
    .instrument(span)
    .await
}

/// Reconcile and fold any error into a requeue
pub async fn handle(ctx: &Context, request: &Request) -> Action {
    match reconcile(ctx, request).await {
        Ok(action) => action,
        Err(err) => {
            warn!(kind = %request.kind, name = %request.key, error = %err, "Reconciliation failed");
            error_policy(&err, &ctx.config)
        }
    }
}

/// Reconcile a key of a known kind
pub async fn reconcile_key(ctx: &Context, kind: ResourceKind, key: &ObjectKey) -> Result<Action> {
    reconcile(ctx, &Request::new(kind, key.clone())).await
}
