//! Trust Chain Controller
//!
//! Reconciles Operator, Account, User and SigningKey resources into key
//! seeds, signed tokens and published account state:
//! - Generates and guards one seed per identity
//! - Resolves each identity's issuer and signs its token
//! - Tracks the signing keys delegated by operators and accounts
//! - Pushes account tokens to the operator's account server and revokes them on deletion
//!
//! ## Convergence Rules
//!
//! 1. **Idempotence**: a pass over unchanged inputs performs no writes
//! 2. **Timestamp insensitivity**: a token is reissued only when its claims, apart from
//!    issuance time, change
//! 3. **Revoke before delete**: a published account leaves the store only after the
//!    account server dropped its token
//!
//! ## Entry Points
//!
//! - [`reconcile`]: run one pass for a [`Request`], surfacing transient errors
//! - [`handle`]: run one pass and fold errors into a requeue [`Action`]
//! - [`watch`]: map changed dependencies to the requests they re-enqueue

pub mod config;
pub mod error;
pub mod events;
pub mod reconcile;
pub mod registry;
pub mod secrets;
pub mod store;
pub mod telemetry;
pub mod watch;

pub use config::{ConfigError, ControllerConfig, LogConfig};
pub use error::{error_policy, Action, ControllerError, Result};
pub use events::{CollectingRecorder, Event, EventReason, EventRecorder, EventType, TracingRecorder};
pub use reconcile::{handle, reconcile, reconcile_key, ConditionError, Context, Outcome};
pub use registry::KindRegistry;
pub use store::{MemoryStore, ObjectStore, Secret, StoreError};
pub use telemetry::init_tracing;
pub use watch::{
    requests_for_account, requests_for_dependents, requests_for_secret, requests_for_signing_key, Request,
};
