//! In-memory object store
//!
//! Default store implementation using in-memory hashmaps. Suitable for
//! tests and single-process use. Data is lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use trustchain_core::{ObjectKey, Resource, ResourceKind};

use super::{ObjectStore, Secret, StoreError};

type ResourceMap = HashMap<(ResourceKind, ObjectKey), Resource>;
type SecretMap = HashMap<ObjectKey, Secret>;

/// In-memory object store implementation
#[derive(Debug)]
pub struct MemoryStore {
    resources: RwLock<ResourceMap>,
    secrets: RwLock<SecretMap>,
    version: AtomicU64,
    writes: AtomicU64,
    injected: RwLock<Option<StoreError>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
            secrets: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            injected: RwLock::new(None),
        }
    }

    /// Number of successful writes so far
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail with `error` (None restores normal operation)
    pub fn fail_writes(&self, error: Option<StoreError>) {
        if let Ok(mut injected) = self.injected.write() {
            *injected = error;
        }
    }

    fn check_injected(&self) -> Result<(), StoreError> {
        match self.injected.read() {
            Ok(injected) => match injected.as_ref() {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            },
            Err(_) => Err(poisoned()),
        }
    }

    fn next_version(&self) -> u64 {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn resources_read(&self) -> Result<RwLockReadGuard<'_, ResourceMap>, StoreError> {
        self.resources.read().map_err(|_| poisoned())
    }

    fn resources_write(&self) -> Result<RwLockWriteGuard<'_, ResourceMap>, StoreError> {
        self.resources.write().map_err(|_| poisoned())
    }

    fn secrets_read(&self) -> Result<RwLockReadGuard<'_, SecretMap>, StoreError> {
        self.secrets.read().map_err(|_| poisoned())
    }

    fn secrets_write(&self) -> Result<RwLockWriteGuard<'_, SecretMap>, StoreError> {
        self.secrets.write().map_err(|_| poisoned())
    }

    /// Remove a resource and every secret it controls
    fn remove_with_owned(
        &self,
        resources: &mut ResourceMap,
        kind: ResourceKind,
        key: &ObjectKey,
    ) -> Result<(), StoreError> {
        let removed = match resources.remove(&(kind, key.clone())) {
            Some(removed) => removed,
            None => return Ok(()),
        };
        self.writes.fetch_add(1, Ordering::SeqCst);

        let uid = removed.metadata().uid.clone();
        let mut secrets = self.secrets_write()?;
        let before = secrets.len();
        secrets.retain(|_, secret| !secret.metadata.owner_references.iter().any(|r| r.uid == uid));

        info!(
            kind = %kind,
            name = %key,
            collected_secrets = before - secrets.len(),
            "Deleted object"
        );
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("store lock poisoned".into())
}

fn describe(kind: ResourceKind, key: &ObjectKey) -> String {
    format!("{} {}", kind, key)
}

/// Copy the status sub-document of `source` into `target`
fn copy_status(target: &mut Resource, source: &Resource) -> Result<(), StoreError> {
    match (target, source) {
        (Resource::Operator(t), Resource::Operator(s)) => t.status = s.status.clone(),
        (Resource::Account(t), Resource::Account(s)) => t.status = s.status.clone(),
        (Resource::User(t), Resource::User(s)) => t.status = s.status.clone(),
        (Resource::SigningKey(t), Resource::SigningKey(s)) => t.status = s.status.clone(),
        _ => return Err(StoreError::Invalid("kind mismatch".into())),
    }
    Ok(())
}

fn spec_eq(a: &Resource, b: &Resource) -> bool {
    match (a, b) {
        (Resource::Operator(a), Resource::Operator(b)) => a.spec == b.spec,
        (Resource::Account(a), Resource::Account(b)) => a.spec == b.spec,
        (Resource::User(a), Resource::User(b)) => a.spec == b.spec,
        (Resource::SigningKey(a), Resource::SigningKey(b)) => a.spec == b.spec,
        _ => false,
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    // =========================================================================
    // Identity Resources
    // =========================================================================

    async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> Result<Resource, StoreError> {
        let resources = self.resources_read()?;
        resources
            .get(&(kind, key.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(describe(kind, key)))
    }

    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Resource>, StoreError> {
        let resources = self.resources_read()?;
        let mut listed: Vec<Resource> = resources
            .iter()
            .filter(|((k, key), _)| *k == kind && key.namespace == namespace)
            .map(|(_, resource)| resource.clone())
            .collect();
        listed.sort_by_key(|r| r.metadata().name.clone());
        Ok(listed)
    }

    async fn create(&self, mut resource: Resource) -> Result<Resource, StoreError> {
        self.check_injected()?;
        let kind = resource.kind();
        let key = resource.key();
        if key.name.is_empty() {
            return Err(StoreError::Invalid("name is required".into()));
        }

        let mut resources = self.resources_write()?;
        if resources.contains_key(&(kind, key.clone())) {
            return Err(StoreError::AlreadyExists(describe(kind, &key)));
        }

        let meta = resource.metadata_mut();
        meta.uid = uuid::Uuid::new_v4().to_string();
        meta.resource_version = self.next_version();
        meta.generation = 1;
        meta.deletion_timestamp = None;

        debug!(kind = %kind, name = %key, "Created object");
        resources.insert((kind, key), resource.clone());
        Ok(resource)
    }

    async fn update(&self, mut resource: Resource) -> Result<Resource, StoreError> {
        self.check_injected()?;
        let kind = resource.kind();
        let key = resource.key();

        let mut resources = self.resources_write()?;
        let stored = resources
            .get(&(kind, key.clone()))
            .ok_or_else(|| StoreError::NotFound(describe(kind, &key)))?;

        if stored.metadata().resource_version != resource.metadata().resource_version {
            return Err(StoreError::Conflict(describe(kind, &key)));
        }

        copy_status(&mut resource, stored)?;
        let spec_changed = !spec_eq(stored, &resource);
        let stored_meta = stored.metadata().clone();

        let meta = resource.metadata_mut();
        meta.uid = stored_meta.uid;
        meta.deletion_timestamp = stored_meta.deletion_timestamp;
        meta.generation = stored_meta.generation + i64::from(spec_changed);
        meta.resource_version = self.next_version();

        if meta.is_deleting() && meta.finalizers.is_empty() {
            self.remove_with_owned(&mut resources, kind, &key)?;
            return Ok(resource);
        }

        resources.insert((kind, key), resource.clone());
        Ok(resource)
    }

    async fn update_status(&self, resource: Resource) -> Result<Resource, StoreError> {
        self.check_injected()?;
        let kind = resource.kind();
        let key = resource.key();

        let mut resources = self.resources_write()?;
        let stored = resources
            .get_mut(&(kind, key.clone()))
            .ok_or_else(|| StoreError::NotFound(describe(kind, &key)))?;

        if stored.metadata().resource_version != resource.metadata().resource_version {
            return Err(StoreError::Conflict(describe(kind, &key)));
        }

        copy_status(stored, &resource)?;
        stored.metadata_mut().resource_version = self.next_version();
        Ok(stored.clone())
    }

    async fn delete(&self, kind: ResourceKind, key: &ObjectKey) -> Result<(), StoreError> {
        self.check_injected()?;
        let mut resources = self.resources_write()?;
        let stored = resources
            .get_mut(&(kind, key.clone()))
            .ok_or_else(|| StoreError::NotFound(describe(kind, key)))?;

        if stored.metadata().finalizers.is_empty() {
            return self.remove_with_owned(&mut resources, kind, key);
        }

        if !stored.metadata().is_deleting() {
            let version = self.next_version();
            let meta = stored.metadata_mut();
            meta.deletion_timestamp = Some(Utc::now());
            meta.resource_version = version;
            info!(kind = %kind, name = %key, "Deletion deferred until finalizers are removed");
        }
        Ok(())
    }

    // =========================================================================
    // Secrets
    // =========================================================================

    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, StoreError> {
        let secrets = self.secrets_read()?;
        secrets
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Secret {}", key)))
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, StoreError> {
        let secrets = self.secrets_read()?;
        Ok(secrets
            .values()
            .filter(|s| s.metadata.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn create_secret(&self, mut secret: Secret) -> Result<Secret, StoreError> {
        self.check_injected()?;
        let key = secret.key();
        if key.name.is_empty() {
            return Err(StoreError::Invalid("secret name is required".into()));
        }

        let mut secrets = self.secrets_write()?;
        if secrets.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("Secret {}", key)));
        }

        secret.metadata.uid = uuid::Uuid::new_v4().to_string();
        secret.metadata.resource_version = self.next_version();
        secrets.insert(key, secret.clone());
        Ok(secret)
    }

    async fn update_secret(&self, mut secret: Secret) -> Result<Secret, StoreError> {
        self.check_injected()?;
        let key = secret.key();

        let mut secrets = self.secrets_write()?;
        let stored = secrets
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(format!("Secret {}", key)))?;

        if stored.metadata.resource_version != secret.metadata.resource_version {
            return Err(StoreError::Conflict(format!("Secret {}", key)));
        }

        if stored.immutable && (stored.data != secret.data || !secret.immutable) {
            return Err(StoreError::Immutable(key.to_string()));
        }

        secret.metadata.uid = stored.metadata.uid.clone();
        secret.metadata.resource_version = self.next_version();
        secrets.insert(key, secret.clone());
        Ok(secret)
    }

    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.check_injected()?;
        let mut secrets = self.secrets_write()?;
        secrets
            .remove(key)
            .map(|_| {
                self.writes.fetch_add(1, Ordering::SeqCst);
            })
            .ok_or_else(|| StoreError::NotFound(format!("Secret {}", key)))
    }
}
