//! Object store abstraction
//!
//! The reconcilers read and write identity resources and secrets only through
//! [`ObjectStore`]. Writes use optimistic concurrency: an update must carry
//! the `resource_version` it was read at, otherwise it fails with
//! [`StoreError::Conflict`].
//!
//! Deleting an object that still carries finalizers only stamps its
//! `deletion_timestamp`; the object disappears once the last finalizer is
//! removed, taking every secret it controls with it.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use trustchain_core::{ObjectKey, ObjectMeta, Resource, ResourceKind};

/// Error type for store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Write conflict on {0}: object was modified")]
    Conflict(String),

    #[error("Secret {0} is immutable")]
    Immutable(String),

    #[error("Invalid object: {0}")]
    Invalid(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Opaque key/value record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secret {
    pub metadata: ObjectMeta,
    pub data: BTreeMap<String, String>,

    /// Data cannot change once written
    pub immutable: bool,
}

impl Secret {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    /// Equality on what the controller manages: data, mutability and ownership
    pub fn semantic_eq(&self, other: &Secret) -> bool {
        self.data == other.data
            && self.immutable == other.immutable
            && self.metadata.owner_references == other.metadata.owner_references
            && self.metadata.labels == other.metadata.labels
    }
}

/// Storage backend for identity resources and secrets
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    // =========================================================================
    // Identity Resources
    // =========================================================================

    /// Get a resource by kind and key
    async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> Result<Resource, StoreError>;

    /// List all resources of a kind in a namespace
    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Resource>, StoreError>;

    /// Create a resource; the store assigns uid and resource version
    async fn create(&self, resource: Resource) -> Result<Resource, StoreError>;

    /// Replace metadata and spec, keeping the stored status
    async fn update(&self, resource: Resource) -> Result<Resource, StoreError>;

    /// Replace the status sub-document only
    async fn update_status(&self, resource: Resource) -> Result<Resource, StoreError>;

    /// Delete a resource, deferred while finalizers remain
    async fn delete(&self, kind: ResourceKind, key: &ObjectKey) -> Result<(), StoreError>;

    // =========================================================================
    // Secrets
    // =========================================================================

    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, StoreError>;

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, StoreError>;

    async fn create_secret(&self, secret: Secret) -> Result<Secret, StoreError>;

    /// Replace a secret; data changes on an immutable secret are rejected
    async fn update_secret(&self, secret: Secret) -> Result<Secret, StoreError>;

    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), StoreError>;
}
