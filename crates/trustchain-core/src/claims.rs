//! Token claim types
//!
//! Claims follow the version 2 layout understood by the account server: a
//! small set of registered claims (`jti`, `iat`, `iss`, `name`, `sub`) plus a
//! `nats` object tagged by identity type.
//!
//! `iat` is stamped at signing time and `jti` is a digest over the claims
//! including `iat`. Both change on every signing, so comparisons between a
//! stored token and freshly built claims must use [`Claims::canonical_eq`].

use serde::{Deserialize, Serialize};

/// Claims layout version
pub const CLAIMS_VERSION: u8 = 2;

/// Value meaning "no limit"
pub const NO_LIMIT: i64 = -1;

/// Signed claim set for an operator, account or user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Digest of the claims, derived at signing time
    #[serde(default)]
    pub jti: String,

    /// Issued-at (unix seconds), set at signing time
    #[serde(default)]
    pub iat: i64,

    /// Public key of the signing key pair
    #[serde(default)]
    pub iss: String,

    /// Human-readable name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Public key of the identity these claims describe
    pub sub: String,

    /// Identity-specific claims
    pub nats: NatsClaims,
}

impl Claims {
    /// Create claims for a subject with empty volatile fields
    pub fn new(name: impl Into<String>, subject: impl Into<String>, nats: NatsClaims) -> Self {
        Self {
            jti: String::new(),
            iat: 0,
            iss: String::new(),
            name: name.into(),
            sub: subject.into(),
            nats,
        }
    }

    /// Copy of these claims with the signing-time fields cleared
    pub fn without_volatile(&self) -> Self {
        Self {
            jti: String::new(),
            iat: 0,
            ..self.clone()
        }
    }

    /// Equality on claim content, ignoring `iat` and the `jti` derived from it
    pub fn canonical_eq(&self, other: &Claims) -> bool {
        self.without_volatile() == other.without_volatile()
    }

    /// Identity type tag of these claims
    pub fn claim_type(&self) -> &'static str {
        match self.nats {
            NatsClaims::Operator(_) => "operator",
            NatsClaims::Account(_) => "account",
            NatsClaims::User(_) => "user",
        }
    }
}

/// Identity-specific claims, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NatsClaims {
    Operator(OperatorData),
    Account(AccountData),
    User(UserData),
}

/// Operator claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signing_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_server_url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operator_service_urls: Vec<String>,

    /// Public key of the system account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_account: Option<String>,

    pub version: u8,
}

/// Account claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<Export>,

    #[serde(default)]
    pub limits: AccountLimits,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signing_keys: Vec<String>,

    #[serde(default)]
    pub default_permissions: Permissions,

    pub version: u8,
}

/// User claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(flatten)]
    pub permissions: Permissions,

    #[serde(flatten)]
    pub limits: UserLimits,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bearer_token: bool,

    /// Account public key, present when the user is signed by an account signing key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_account: Option<String>,

    pub version: u8,
}

/// Publish/subscribe permissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(rename = "pub", default, skip_serializing_if = "Permission::is_empty")]
    pub publish: Permission,

    #[serde(rename = "sub", default, skip_serializing_if = "Permission::is_empty")]
    pub subscribe: Permission,

    #[serde(rename = "resp", default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponsePermission>,
}

/// Allow/deny subject lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<String>,
}

impl Permission {
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }
}

/// Permission to publish responses to received requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePermission {
    /// Maximum number of responses per request
    pub max: i64,

    /// Time-to-live of the response permission, in nanoseconds
    pub ttl: i64,
}

/// Account-wide limits, `-1` meaning unlimited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLimits {
    pub subs: i64,
    pub data: i64,
    pub payload: i64,
    pub imports: i64,
    pub exports: i64,
    pub wildcards: bool,
    pub conn: i64,
    pub leaf: i64,

    /// JetStream limits, `0` meaning JetStream disabled
    #[serde(default)]
    pub mem_storage: i64,
    #[serde(default)]
    pub disk_storage: i64,
    #[serde(default)]
    pub streams: i64,
    #[serde(default)]
    pub consumer: i64,
}

impl Default for AccountLimits {
    fn default() -> Self {
        Self {
            subs: NO_LIMIT,
            data: NO_LIMIT,
            payload: NO_LIMIT,
            imports: NO_LIMIT,
            exports: NO_LIMIT,
            wildcards: true,
            conn: NO_LIMIT,
            leaf: NO_LIMIT,
            mem_storage: 0,
            disk_storage: 0,
            streams: 0,
            consumer: 0,
        }
    }
}

/// Per-user limits, `-1` meaning unlimited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLimits {
    pub subs: i64,
    pub data: i64,
    pub payload: i64,

    /// Allowed source CIDRs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub src: Vec<String>,
}

impl Default for UserLimits {
    fn default() -> Self {
        Self {
            subs: NO_LIMIT,
            data: NO_LIMIT,
            payload: NO_LIMIT,
            src: Vec::new(),
        }
    }
}

/// Kind of an import or export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    Stream,
    Service,
}

/// Subject imported from another account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    pub subject: String,

    /// Public key of the exporting account
    pub account: String,

    /// Local subject the import is mapped to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    #[serde(rename = "type")]
    pub export_type: ExportType,
}

/// Subject exported to other accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    pub subject: String,

    #[serde(rename = "type")]
    pub export_type: ExportType,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub token_req: bool,

    /// Response type for service exports: `Singleton`, `Stream` or `Chunked`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
}
