//! # Trustchain Core
//!
//! Key material, signed tokens and the identity resource model for the
//! trust-chain controller.
//!
//! ## Key Concepts
//!
//! - **Operator**: root of trust, self-signed
//! - **Account**: tenant trust boundary, signed by an operator or one of its signing keys
//! - **User**: client identity, signed by an account or one of its signing keys
//! - **SigningKey**: delegated credential extending its owner's trust
//!
//! ## Trust Chain Invariants
//!
//! 1. **Seed integrity**: the public key recorded in status always matches the stored seed
//! 2. **Single root**: the chain has exactly one root, an operator that issues itself
//! 3. **Owner kinds**: a signing key is owned by an operator or an account, never anything else
//! 4. **Canonical tokens**: token content, apart from its issuance time, matches the claims
//!    derivable from spec and resolved state

pub mod claims;
pub mod condition;
pub mod error;
pub mod issue;
pub mod nkey;
pub mod resource;
pub mod selector;
pub mod token;

pub use claims::{Claims, NatsClaims};
pub use condition::{Condition, ConditionSchema, ConditionSet, ConditionStatus, ConditionType, Reason};
pub use error::{CoreError, Result};
pub use nkey::{KeyPair, KeyPrefix};
pub use resource::{
    Account, HasConditions, KeyPairStatus, KeyPairable, Object, ObjectKey, ObjectMeta, Operator,
    Resource, ResourceKind, SigningKey, SigningKeyEmbeddedStatus, TypedObjectReference, User,
};
pub use selector::LabelSelector;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
