//! Mock Publisher
//!
//! For testing purposes - records every call and keeps published tokens in
//! memory. Failures can be injected per operation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use trustchain_core::token;

use crate::error::{PublishError, Result};
use crate::publisher::{Connector, TokenPublisher};
use crate::types::ConnectOptions;

/// A call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishCall {
    Connect { url: String },
    Push { subject: String },
    Update { subject: String },
    Delete { public_key: String },
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<PublishCall>,
    published: HashMap<String, String>,
    fail_connect: Option<String>,
    fail_push: Option<String>,
    fail_delete: Option<String>,
}

/// Mock connector; clones share state
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent connect fail
    pub fn fail_connect(&self, message: impl Into<String>) {
        self.state().fail_connect = Some(message.into());
    }

    /// Make every subsequent push or update fail
    pub fn fail_push(&self, message: impl Into<String>) {
        self.state().fail_push = Some(message.into());
    }

    /// Make every subsequent delete fail
    pub fn fail_delete(&self, message: impl Into<String>) {
        self.state().fail_delete = Some(message.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.fail_connect = None;
        state.fail_push = None;
        state.fail_delete = None;
    }

    /// Every call observed so far, in order
    pub fn calls(&self) -> Vec<PublishCall> {
        self.state().calls.clone()
    }

    /// Number of pushes and updates observed
    pub fn push_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, PublishCall::Push { .. } | PublishCall::Update { .. }))
            .count()
    }

    /// Number of deletes observed
    pub fn delete_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, PublishCall::Delete { .. }))
            .count()
    }

    /// Token currently published for a subject
    pub fn published(&self, subject: &str) -> Option<String> {
        self.state().published.get(subject).cloned()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, options: ConnectOptions) -> Result<Box<dyn TokenPublisher>> {
        let mut state = self.state();
        state.calls.push(PublishCall::Connect {
            url: options.url.clone(),
        });

        if let Some(message) = &state.fail_connect {
            return Err(PublishError::ConnectionFailed(message.clone()));
        }

        Ok(Box::new(MockPublisher {
            connector: self.clone(),
        }))
    }
}

/// Publisher handed out by [`MockConnector`]
pub struct MockPublisher {
    connector: MockConnector,
}

#[async_trait]
impl TokenPublisher for MockPublisher {
    async fn push(&self, token: &str) -> Result<()> {
        let claims = token::decode(token)?;
        let mut state = self.connector.state();
        state.calls.push(PublishCall::Push {
            subject: claims.sub.clone(),
        });

        if let Some(message) = &state.fail_push {
            return Err(PublishError::Rejected {
                status: 500,
                message: message.clone(),
            });
        }

        state.published.insert(claims.sub, token.to_string());
        Ok(())
    }

    async fn update(&self, subject: &str, token: &str) -> Result<()> {
        let mut state = self.connector.state();
        state.calls.push(PublishCall::Update {
            subject: subject.to_string(),
        });

        if let Some(message) = &state.fail_push {
            return Err(PublishError::Rejected {
                status: 500,
                message: message.clone(),
            });
        }

        state.published.insert(subject.to_string(), token.to_string());
        Ok(())
    }

    async fn delete(&self, public_key: &str) -> Result<()> {
        let mut state = self.connector.state();
        state.calls.push(PublishCall::Delete {
            public_key: public_key.to_string(),
        });

        if let Some(message) = &state.fail_delete {
            return Err(PublishError::Rejected {
                status: 500,
                message: message.clone(),
            });
        }

        state.published.remove(public_key);
        Ok(())
    }

    fn description(&self) -> &str {
        "mock publisher"
    }
}
