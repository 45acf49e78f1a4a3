//! Identity resources: Operator, Account, User and SigningKey
//!
//! Each resource has object metadata, a specification (desired state) and a
//! status (observed state). Status is a separate sub-document; the
//! reconcilers only ever write status, finalizers and secrets.
//!
//! Two capabilities are shared across kinds:
//! - [`HasConditions`]: the resource embeds a condition set with a schema
//! - [`KeyPairable`]: the resource owns a key pair recorded in its status
//!
//! [`Resource`] is the closed set of kinds, used wherever a reference may
//! point at more than one kind (issuers, signing-key owners).

use crate::claims::{AccountLimits, Export, Import, Permissions, UserLimits};
use crate::condition::{ConditionSchema, ConditionSet, ConditionType, Reason};
use crate::nkey::KeyPrefix;
use crate::selector::LabelSelector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API group of the identity resources
pub const API_GROUP: &str = "accounts.nats.io";

/// API version of the identity resources
pub const API_VERSION: &str = "accounts.nats.io/v1alpha1";

/// Identity resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Operator,
    Account,
    User,
    SigningKey,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Operator,
        ResourceKind::Account,
        ResourceKind::User,
        ResourceKind::SigningKey,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Operator => "Operator",
            ResourceKind::Account => "Account",
            ResourceKind::User => "User",
            ResourceKind::SigningKey => "SigningKey",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace + name identifying an object of a known kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Reference from an owned object back to its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
}

/// Object metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,

    /// Assigned by the store on creation
    #[serde(default)]
    pub uid: String,

    /// Bumped by the store on every write
    #[serde(default)]
    pub resource_version: u64,

    /// Bumped by the store on every spec change
    #[serde(default)]
    pub generation: i64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Returns true if the finalizer was added
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Returns true if the finalizer was present
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        before != self.finalizers.len()
    }

    /// The owner reference flagged as controller, if any
    pub fn controller_owner(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }
}

/// Reference to an object whose kind is given explicitly
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedObjectReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl TypedObjectReference {
    /// Reference an identity resource of a known kind
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: kind.as_str().to_string(),
            name: name.into(),
            namespace: None,
            uid: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Fully-qualified reference to an existing object
    pub fn to_object(kind: ResourceKind, meta: &ObjectMeta) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: kind.as_str().to_string(),
            name: meta.name.clone(),
            namespace: Some(meta.namespace.clone()),
            uid: Some(meta.uid.clone()).filter(|uid| !uid.is_empty()),
        }
    }

    /// Key of the referenced object, defaulting the namespace
    pub fn key_or(&self, fallback_namespace: &str) -> ObjectKey {
        ObjectKey::new(
            self.namespace.as_deref().unwrap_or(fallback_namespace),
            &self.name,
        )
    }

    /// `apiVersion, Kind=...` form used in messages
    pub fn kind_string(&self) -> String {
        format!("{}, Kind={}", self.api_version, self.kind)
    }
}

/// Reference whose kind is implied by where it is used
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl InferredObjectReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn from_key(key: &ObjectKey) -> Self {
        Self {
            namespace: Some(key.namespace.clone()),
            name: key.name.clone(),
        }
    }

    pub fn key_or(&self, fallback_namespace: &str) -> ObjectKey {
        ObjectKey::new(
            self.namespace.as_deref().unwrap_or(fallback_namespace),
            &self.name,
        )
    }
}

/// Which object signs this resource's token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerReference {
    #[serde(rename = "ref")]
    pub reference: TypedObjectReference,
}

impl IssuerReference {
    pub fn new(reference: TypedObjectReference) -> Self {
        Self { reference }
    }
}

/// Public half of a resource's key pair and where its seed lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairStatus {
    pub public_key: String,
    pub seed_secret_name: String,
}

/// One active signing key as recorded on its owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKeyEmbeddedStatus {
    pub name: String,
    pub key_pair: KeyPairStatus,
}

// KeyPairStatus needs Hash/Ord for membership comparisons
impl std::hash::Hash for KeyPairStatus {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.public_key.hash(state);
        self.seed_secret_name.hash(state);
    }
}

impl PartialOrd for KeyPairStatus {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPairStatus {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.public_key, &self.seed_secret_name).cmp(&(&other.public_key, &other.seed_secret_name))
    }
}

/// Selects a key within a secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Transport security for connections to the account server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// CA bundle used to verify the account server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<SecretKeySelector>,
}

// =============================================================================
// Capabilities
// =============================================================================

/// Access to the object metadata of any resource
pub trait Object {
    fn kind(&self) -> ResourceKind;
    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ObjectKey {
        self.metadata().key()
    }
}

/// A resource with a condition set
pub trait HasConditions {
    fn condition_schema(&self) -> &'static ConditionSchema;
    fn conditions(&self) -> &ConditionSet;
    fn conditions_mut(&mut self) -> &mut ConditionSet;

    fn initialize_conditions(&mut self) {
        let schema = self.condition_schema();
        self.conditions_mut().initialize(schema);
    }

    fn mark_true(&mut self, condition_type: ConditionType) {
        let schema = self.condition_schema();
        self.conditions_mut().mark_true(schema, condition_type);
    }

    fn mark_false(&mut self, condition_type: ConditionType, reason: Reason, message: impl Into<String>)
    where
        Self: Sized,
    {
        let schema = self.condition_schema();
        self.conditions_mut().mark_false(schema, condition_type, reason, message);
    }

    fn mark_unknown(&mut self, condition_type: ConditionType, reason: Reason, message: impl Into<String>)
    where
        Self: Sized,
    {
        let schema = self.condition_schema();
        self.conditions_mut().mark_unknown(schema, condition_type, reason, message);
    }

    fn is_condition_true(&self, condition_type: ConditionType) -> bool {
        self.conditions().is_true(condition_type)
    }

    fn is_ready(&self) -> bool {
        self.conditions().is_ready(self.condition_schema())
    }
}

/// A resource that owns a key pair
pub trait KeyPairable: Object + HasConditions {
    fn key_pair(&self) -> Option<&KeyPairStatus>;
    fn set_key_pair(&mut self, key_pair: KeyPairStatus);

    /// Name of the secret holding this resource's seed
    fn seed_secret_name(&self) -> &str;

    /// Role of the key pair this resource owns
    fn key_prefix(&self) -> KeyPrefix;
}

// =============================================================================
// Operator
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSpec {
    pub jwt_secret_name: String,
    pub seed_secret_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_keys_selector: Option<LabelSelector>,

    pub account_server_url: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operator_service_urls: Vec<String>,

    /// The account used by the operator for system traffic
    pub system_account_ref: InferredObjectReference,

    /// A user of the system account whose credentials authenticate publication
    pub system_account_user_ref: InferredObjectReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorStatus {
    #[serde(default)]
    pub conditions: ConditionSet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pair: Option<KeyPairStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signing_keys: Vec<SigningKeyEmbeddedStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_system_account: Option<InferredObjectReference>,
}

/// Root of trust; self-signed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub metadata: ObjectMeta,
    pub spec: OperatorSpec,
    #[serde(default)]
    pub status: OperatorStatus,
}

// =============================================================================
// Account
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSpec {
    pub issuer: IssuerReference,
    pub jwt_secret_name: String,
    pub seed_secret_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_keys_selector: Option<LabelSelector>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<Export>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<AccountLimits>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_permissions: Option<Permissions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    #[serde(default)]
    pub conditions: ConditionSet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pair: Option<KeyPairStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_ref: Option<InferredObjectReference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signing_keys: Vec<SigningKeyEmbeddedStatus>,
}

/// Tenant trust boundary, issued by an operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub metadata: ObjectMeta,
    pub spec: AccountSpec,
    #[serde(default)]
    pub status: AccountStatus,
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    pub issuer: IssuerReference,
    pub jwt_secret_name: String,
    pub seed_secret_name: String,
    pub credentials_secret_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<UserLimits>,

    #[serde(default)]
    pub bearer_token: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    #[serde(default)]
    pub conditions: ConditionSet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pair: Option<KeyPairStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_ref: Option<InferredObjectReference>,
}

/// Client identity, issued by an account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub metadata: ObjectMeta,
    pub spec: UserSpec,
    #[serde(default)]
    pub status: UserStatus,
}

// =============================================================================
// SigningKey
// =============================================================================

/// Role of the key pair a signing key holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningKeyType {
    Operator,
    #[default]
    Account,
}

impl SigningKeyType {
    pub fn key_prefix(self) -> KeyPrefix {
        match self {
            SigningKeyType::Operator => KeyPrefix::Operator,
            SigningKeyType::Account => KeyPrefix::Account,
        }
    }

    /// Kind the owner of a signing key of this type must be
    pub fn owner_kind(self) -> ResourceKind {
        match self {
            SigningKeyType::Operator => ResourceKind::Operator,
            SigningKeyType::Account => ResourceKind::Account,
        }
    }
}

/// Owner of a signing key, always in the signing key's namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKeyOwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKeySpec {
    #[serde(rename = "type")]
    pub key_type: SigningKeyType,
    pub seed_secret_name: String,
    pub owner_ref: SigningKeyOwnerReference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKeyStatus {
    #[serde(default)]
    pub conditions: ConditionSet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pair: Option<KeyPairStatus>,

    /// Resolved owner, including its UID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_ref: Option<TypedObjectReference>,
}

/// Delegated signing credential extending an operator's or account's trust
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SigningKey {
    pub metadata: ObjectMeta,
    pub spec: SigningKeySpec,
    #[serde(default)]
    pub status: SigningKeyStatus,
}

// =============================================================================
// Capability implementations
// =============================================================================

macro_rules! identity_resource {
    ($ty:ty, $kind:expr, $schema:expr) => {
        impl Object for $ty {
            fn kind(&self) -> ResourceKind {
                $kind
            }

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
        }

        impl HasConditions for $ty {
            fn condition_schema(&self) -> &'static ConditionSchema {
                &$schema
            }

            fn conditions(&self) -> &ConditionSet {
                &self.status.conditions
            }

            fn conditions_mut(&mut self) -> &mut ConditionSet {
                &mut self.status.conditions
            }
        }
    };
}

identity_resource!(Operator, ResourceKind::Operator, ConditionSchema::OPERATOR);
identity_resource!(Account, ResourceKind::Account, ConditionSchema::ACCOUNT);
identity_resource!(User, ResourceKind::User, ConditionSchema::USER);
identity_resource!(SigningKey, ResourceKind::SigningKey, ConditionSchema::SIGNING_KEY);

impl KeyPairable for Operator {
    fn key_pair(&self) -> Option<&KeyPairStatus> {
        self.status.key_pair.as_ref()
    }

    fn set_key_pair(&mut self, key_pair: KeyPairStatus) {
        self.status.key_pair = Some(key_pair);
    }

    fn seed_secret_name(&self) -> &str {
        &self.spec.seed_secret_name
    }

    fn key_prefix(&self) -> KeyPrefix {
        KeyPrefix::Operator
    }
}

impl KeyPairable for Account {
    fn key_pair(&self) -> Option<&KeyPairStatus> {
        self.status.key_pair.as_ref()
    }

    fn set_key_pair(&mut self, key_pair: KeyPairStatus) {
        self.status.key_pair = Some(key_pair);
    }

    fn seed_secret_name(&self) -> &str {
        &self.spec.seed_secret_name
    }

    fn key_prefix(&self) -> KeyPrefix {
        KeyPrefix::Account
    }
}

impl KeyPairable for User {
    fn key_pair(&self) -> Option<&KeyPairStatus> {
        self.status.key_pair.as_ref()
    }

    fn set_key_pair(&mut self, key_pair: KeyPairStatus) {
        self.status.key_pair = Some(key_pair);
    }

    fn seed_secret_name(&self) -> &str {
        &self.spec.seed_secret_name
    }

    fn key_prefix(&self) -> KeyPrefix {
        KeyPrefix::User
    }
}

impl KeyPairable for SigningKey {
    fn key_pair(&self) -> Option<&KeyPairStatus> {
        self.status.key_pair.as_ref()
    }

    fn set_key_pair(&mut self, key_pair: KeyPairStatus) {
        self.status.key_pair = Some(key_pair);
    }

    fn seed_secret_name(&self) -> &str {
        &self.spec.seed_secret_name
    }

    fn key_prefix(&self) -> KeyPrefix {
        self.spec.key_type.key_prefix()
    }
}

// =============================================================================
// Resource (closed set of kinds)
// =============================================================================

/// Any identity resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Resource {
    Operator(Operator),
    Account(Account),
    User(User),
    SigningKey(SigningKey),
}

impl Resource {
    /// Zero-valued resource of the given kind
    pub fn empty(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Operator => Resource::Operator(Operator::default()),
            ResourceKind::Account => Resource::Account(Account::default()),
            ResourceKind::User => Resource::User(User::default()),
            ResourceKind::SigningKey => Resource::SigningKey(SigningKey::default()),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.as_key_pairable().kind()
    }

    pub fn metadata(&self) -> &ObjectMeta {
        self.as_key_pairable().metadata()
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        self.as_key_pairable_mut().metadata_mut()
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata().key()
    }

    pub fn as_key_pairable(&self) -> &dyn KeyPairable {
        match self {
            Resource::Operator(r) => r,
            Resource::Account(r) => r,
            Resource::User(r) => r,
            Resource::SigningKey(r) => r,
        }
    }

    pub fn as_key_pairable_mut(&mut self) -> &mut dyn KeyPairable {
        match self {
            Resource::Operator(r) => r,
            Resource::Account(r) => r,
            Resource::User(r) => r,
            Resource::SigningKey(r) => r,
        }
    }
}

impl From<Operator> for Resource {
    fn from(r: Operator) -> Self {
        Resource::Operator(r)
    }
}

impl From<Account> for Resource {
    fn from(r: Account) -> Self {
        Resource::Account(r)
    }
}

impl From<User> for Resource {
    fn from(r: User) -> Self {
        Resource::User(r)
    }
}

impl From<SigningKey> for Resource {
    fn from(r: SigningKey) -> Self {
        Resource::SigningKey(r)
    }
}

macro_rules! resource_downcast {
    ($ty:ident) => {
        impl TryFrom<Resource> for $ty {
            type Error = Resource;

            fn try_from(resource: Resource) -> Result<Self, Self::Error> {
                match resource {
                    Resource::$ty(r) => Ok(r),
                    other => Err(other),
                }
            }
        }
    };
}

resource_downcast!(Operator);
resource_downcast!(Account);
resource_downcast!(User);
resource_downcast!(SigningKey);
