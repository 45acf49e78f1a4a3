//! Controller errors and requeue policy
//!
//! Only transient failures are errors. Problems that need a spec or secret
//! edit are recorded as conditions and never reach [`error_policy`].

use std::time::Duration;
use thiserror::Error;
use trustchain_core::CoreError;
use trustchain_publish::PublishError;

use crate::config::ControllerConfig;
use crate::store::StoreError;

/// Result type for reconciliation
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Transient reconciliation failures, retried with backoff
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Object store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Account server failure
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Key material or token failure
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Account server did not answer in time
    #[error("Publish timed out after {0:?}")]
    PublishTimeout(Duration),

    /// Finalization could not complete
    #[error("Finalization failed: {0}")]
    Finalize(String),
}

impl ControllerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControllerError::Store(e) if e.is_not_found())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ControllerError::Store(e) if e.is_conflict())
    }
}

/// What the delivery layer should do after a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    requeue_after: Option<Duration>,
}

impl Action {
    /// Reconcile again after `duration`
    pub fn requeue(duration: Duration) -> Self {
        Self {
            requeue_after: Some(duration),
        }
    }

    /// Reconcile again only when a watched object changes
    pub fn await_change() -> Self {
        Self { requeue_after: None }
    }

    pub fn requeue_after(&self) -> Option<Duration> {
        self.requeue_after
    }
}

/// Map a failed reconciliation to a requeue
///
/// Write conflicts wait the fixed conflict delay instead of retrying in a
/// tight loop against the concurrent writer.
pub fn error_policy(error: &ControllerError, config: &ControllerConfig) -> Action {
    if error.is_conflict() {
        Action::requeue(config.conflict_requeue)
    } else {
        Action::requeue(config.error_requeue)
    }
}
