//! Kind registry
//!
//! Maps an `(apiVersion, kind)` pair, as written in a typed reference, to a
//! constructor for an empty object of that kind. References to kinds that
//! are not registered fail closed.

use std::collections::HashMap;
use tracing::debug;
use trustchain_core::resource::API_VERSION;
use trustchain_core::{Resource, ResourceKind, TypedObjectReference};

/// Builds an empty object of one kind
pub type Constructor = fn() -> Resource;

/// Explicit kind → constructor map, built at startup
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    constructors: HashMap<(String, String), Constructor>,
}

impl KindRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four identity kinds
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(API_VERSION, ResourceKind::Operator.as_str(), || {
            Resource::empty(ResourceKind::Operator)
        });
        registry.register(API_VERSION, ResourceKind::Account.as_str(), || {
            Resource::empty(ResourceKind::Account)
        });
        registry.register(API_VERSION, ResourceKind::User.as_str(), || {
            Resource::empty(ResourceKind::User)
        });
        registry.register(API_VERSION, ResourceKind::SigningKey.as_str(), || {
            Resource::empty(ResourceKind::SigningKey)
        });
        registry
    }

    pub fn register(&mut self, api_version: &str, kind: &str, constructor: Constructor) {
        debug!(api_version, kind, "Registered kind");
        self.constructors
            .insert((api_version.to_string(), kind.to_string()), constructor);
    }

    /// Empty object of the given kind, if registered
    pub fn construct(&self, api_version: &str, kind: &str) -> Option<Resource> {
        self.constructors
            .get(&(api_version.to_string(), kind.to_string()))
            .map(|constructor| constructor())
    }

    /// Identity kind a typed reference points at, if registered
    pub fn resolve_kind(&self, reference: &TypedObjectReference) -> Option<ResourceKind> {
        self.construct(&reference.api_version, &reference.kind)
            .map(|empty| empty.kind())
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry() {
        let registry = KindRegistry::standard();
        assert_eq!(registry.len(), 4);

        for kind in ResourceKind::ALL {
            let reference = TypedObjectReference::new(kind, "x");
            assert_eq!(registry.resolve_kind(&reference), Some(kind));
        }
    }

    #[test]
    fn test_unknown_kind_fails_closed() {
        let registry = KindRegistry::standard();

        let mut reference = TypedObjectReference::new(ResourceKind::Account, "x");
        reference.kind = "Team".into();
        assert_eq!(registry.resolve_kind(&reference), None);

        let mut reference = TypedObjectReference::new(ResourceKind::Account, "x");
        reference.api_version = "accounts.nats.io/v2".into();
        assert_eq!(registry.resolve_kind(&reference), None);
    }

    #[test]
    fn test_empty_registry_resolves_nothing() {
        let registry = KindRegistry::new();
        assert!(registry.is_empty());
        assert!(registry
            .construct(API_VERSION, ResourceKind::Operator.as_str())
            .is_none());
    }
}
