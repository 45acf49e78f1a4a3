//! Events emitted when managed state changes

use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};
use trustchain_core::{Object, ObjectKey, ResourceKind};

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

/// Why an event was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventReason {
    SeedSecretCreated,
    SeedSecretUpdated,
    JwtSecretCreated,
    JwtSecretUpdated,
    CredentialsSecretCreated,
    CredentialsSecretUpdated,
    SigningKeysChanged,
    InvalidSigningKeysSelector,
}

impl EventReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventReason::SeedSecretCreated => "SeedSecretCreated",
            EventReason::SeedSecretUpdated => "SeedSecretUpdated",
            EventReason::JwtSecretCreated => "JWTSecretCreated",
            EventReason::JwtSecretUpdated => "JWTSecretUpdated",
            EventReason::CredentialsSecretCreated => "CredentialsSecretCreated",
            EventReason::CredentialsSecretUpdated => "CredentialsSecretUpdated",
            EventReason::SigningKeysChanged => "SigningKeysChanged",
            EventReason::InvalidSigningKeysSelector => "InvalidSigningKeysSelector",
        }
    }
}

impl std::fmt::Display for EventReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: ResourceKind,
    pub key: ObjectKey,
    pub event_type: EventType,
    pub reason: EventReason,
    pub message: String,
}

impl Event {
    pub fn normal<R: Object + ?Sized>(resource: &R, reason: EventReason, message: impl Into<String>) -> Self {
        Self {
            kind: resource.kind(),
            key: resource.key(),
            event_type: EventType::Normal,
            reason,
            message: message.into(),
        }
    }

    pub fn warning<R: Object + ?Sized>(resource: &R, reason: EventReason, message: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Warning,
            ..Self::normal(resource, reason, message)
        }
    }
}

/// Sink for events
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: Event);
}

/// Writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl EventRecorder for TracingRecorder {
    fn record(&self, event: Event) {
        match event.event_type {
            EventType::Normal => info!(
                kind = %event.kind,
                name = %event.key,
                reason = %event.reason,
                "{}",
                event.message
            ),
            EventType::Warning => warn!(
                kind = %event.kind,
                name = %event.key,
                reason = %event.reason,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps events in memory, for tests
#[derive(Debug, Default)]
pub struct CollectingRecorder {
    events: Mutex<Vec<Event>>,
}

impl CollectingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Reasons recorded for one object, in order
    pub fn reasons_for(&self, key: &ObjectKey) -> Vec<EventReason> {
        self.events()
            .into_iter()
            .filter(|e| &e.key == key)
            .map(|e| e.reason)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl EventRecorder for CollectingRecorder {
    fn record(&self, event: Event) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}
