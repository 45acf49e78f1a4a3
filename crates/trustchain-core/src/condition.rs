//! Status conditions
//!
//! Every identity resource carries a list of named conditions. Each kind
//! declares a [`ConditionSchema`] naming the conditions that must all be
//! `True` for the aggregate `Ready` condition to be `True`. `Ready` is
//! recomputed after every mutation:
//!
//! - any dependent `False` makes `Ready` `False` with that dependent's reason
//! - otherwise any dependent `Unknown` makes `Ready` `Unknown`
//! - otherwise `Ready` is `True`
//!
//! `last_transition_time` only moves when a condition's status changes, so
//! re-applying the same outcome leaves the status untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named condition types across all identity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    Ready,
    SeedSecretReady,
    IssuerResolved,
    OperatorResolved,
    AccountResolved,
    OwnerResolved,
    SigningKeysUpdated,
    SystemAccountResolved,
    #[serde(rename = "JWTSecretReady")]
    JwtSecretReady,
    #[serde(rename = "JWTPushed")]
    JwtPushed,
    CredentialsSecretReady,
}

impl ConditionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConditionType::Ready => "Ready",
            ConditionType::SeedSecretReady => "SeedSecretReady",
            ConditionType::IssuerResolved => "IssuerResolved",
            ConditionType::OperatorResolved => "OperatorResolved",
            ConditionType::AccountResolved => "AccountResolved",
            ConditionType::OwnerResolved => "OwnerResolved",
            ConditionType::SigningKeysUpdated => "SigningKeysUpdated",
            ConditionType::SystemAccountResolved => "SystemAccountResolved",
            ConditionType::JwtSecretReady => "JWTSecretReady",
            ConditionType::JwtPushed => "JWTPushed",
            ConditionType::CredentialsSecretReady => "CredentialsSecretReady",
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state condition status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Machine-readable reasons attached to non-True conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    UnknownError,
    NotFound,
    NotReady,
    UnsupportedIssuer,
    InvalidSigningKeyOwner,
    InvalidSeedSecret,
    MalformedSeedSecret,
    InvalidJwtSecret,
    IssuerSeedError,
    PublicKeyMismatch,
    JwtPushError,
    InvalidSigningKeysSelector,
    InvalidTlsConfig,
    SystemAccountNotReady,
}

impl Reason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Reason::UnknownError => "UnknownError",
            Reason::NotFound => "NotFound",
            Reason::NotReady => "NotReady",
            Reason::UnsupportedIssuer => "UnsupportedIssuer",
            Reason::InvalidSigningKeyOwner => "InvalidSigningKeyOwner",
            Reason::InvalidSeedSecret => "InvalidSeedSecret",
            Reason::MalformedSeedSecret => "MalformedSeedSecret",
            Reason::InvalidJwtSecret => "InvalidJWTSecret",
            Reason::IssuerSeedError => "IssuerSeedError",
            Reason::PublicKeyMismatch => "PublicKeyMismatch",
            Reason::JwtPushError => "JWTPushError",
            Reason::InvalidSigningKeysSelector => "InvalidSigningKeysSelector",
            Reason::InvalidTlsConfig => "InvalidTLSConfig",
            Reason::SystemAccountNotReady => "SystemAccountNotReady",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn is_false(&self) -> bool {
        self.status == ConditionStatus::False
    }
}

/// The conditions a kind tracks and which of them gate readiness
#[derive(Debug)]
pub struct ConditionSchema {
    pub dependents: &'static [ConditionType],
}

impl ConditionSchema {
    pub const OPERATOR: ConditionSchema = ConditionSchema {
        dependents: &[
            ConditionType::SeedSecretReady,
            ConditionType::SigningKeysUpdated,
            ConditionType::SystemAccountResolved,
            ConditionType::JwtSecretReady,
        ],
    };

    pub const ACCOUNT: ConditionSchema = ConditionSchema {
        dependents: &[
            ConditionType::SeedSecretReady,
            ConditionType::IssuerResolved,
            ConditionType::OperatorResolved,
            ConditionType::SigningKeysUpdated,
            ConditionType::JwtSecretReady,
            ConditionType::JwtPushed,
        ],
    };

    pub const USER: ConditionSchema = ConditionSchema {
        dependents: &[
            ConditionType::SeedSecretReady,
            ConditionType::IssuerResolved,
            ConditionType::AccountResolved,
            ConditionType::JwtSecretReady,
            ConditionType::CredentialsSecretReady,
        ],
    };

    pub const SIGNING_KEY: ConditionSchema = ConditionSchema {
        dependents: &[ConditionType::SeedSecretReady, ConditionType::OwnerResolved],
    };
}

/// Ordered list of conditions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(Vec<Condition>);

impl ConditionSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add every condition of the schema that is missing, as `Unknown`
    pub fn initialize(&mut self, schema: &ConditionSchema) {
        let now = Utc::now();
        for condition_type in std::iter::once(&ConditionType::Ready).chain(schema.dependents) {
            if self.get(*condition_type).is_none() {
                self.0.push(Condition {
                    condition_type: *condition_type,
                    status: ConditionStatus::Unknown,
                    reason: String::new(),
                    message: String::new(),
                    last_transition_time: Some(now),
                });
            }
        }
    }

    pub fn get(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.0.iter().find(|c| c.condition_type == condition_type)
    }

    pub fn is_true(&self, condition_type: ConditionType) -> bool {
        self.get(condition_type).map(Condition::is_true).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn mark_true(&mut self, schema: &ConditionSchema, condition_type: ConditionType) {
        self.set(condition_type, ConditionStatus::True, "", "");
        self.recompute_ready(schema);
    }

    pub fn mark_false(
        &mut self,
        schema: &ConditionSchema,
        condition_type: ConditionType,
        reason: Reason,
        message: impl Into<String>,
    ) {
        self.set(condition_type, ConditionStatus::False, reason.as_str(), &message.into());
        self.recompute_ready(schema);
    }

    pub fn mark_unknown(
        &mut self,
        schema: &ConditionSchema,
        condition_type: ConditionType,
        reason: Reason,
        message: impl Into<String>,
    ) {
        self.set(condition_type, ConditionStatus::Unknown, reason.as_str(), &message.into());
        self.recompute_ready(schema);
    }

    /// True iff every dependent of the schema is `True`
    pub fn is_ready(&self, schema: &ConditionSchema) -> bool {
        schema.dependents.iter().all(|t| self.is_true(*t))
    }

    fn set(&mut self, condition_type: ConditionType, status: ConditionStatus, reason: &str, message: &str) {
        match self.0.iter_mut().find(|c| c.condition_type == condition_type) {
            Some(existing) => {
                if existing.status != status {
                    existing.last_transition_time = Some(Utc::now());
                }
                existing.status = status;
                existing.reason = reason.to_string();
                existing.message = message.to_string();
            }
            None => self.0.push(Condition {
                condition_type,
                status,
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: Some(Utc::now()),
            }),
        }
    }

    fn recompute_ready(&mut self, schema: &ConditionSchema) {
        let dependents: Vec<Condition> = schema
            .dependents
            .iter()
            .map(|t| {
                self.get(*t).cloned().unwrap_or(Condition {
                    condition_type: *t,
                    status: ConditionStatus::Unknown,
                    reason: String::new(),
                    message: String::new(),
                    last_transition_time: None,
                })
            })
            .collect();

        let (status, reason, message) =
            if let Some(failed) = dependents.iter().find(|c| c.is_false()) {
                (ConditionStatus::False, failed.reason.clone(), failed.message.clone())
            } else if let Some(pending) = dependents.iter().find(|c| !c.is_true()) {
                (ConditionStatus::Unknown, pending.reason.clone(), pending.message.clone())
            } else {
                (ConditionStatus::True, String::new(), String::new())
            };

        self.set(ConditionType::Ready, status, &reason, &message);
    }
}
