use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use strum::{Display, EnumString};
use uuid::Uuid;

use errors::{DocumentError, PayloadField};

use crate::scope::{ScopeAttributes, ScopeRestrictions};
use crate::traits::ContextTarget;

/// JSON object payload carried by documents and local overrides.
pub type JsonObject = Map<String, Value>;

/// Default weight of a scoped document. Lower weights merge first.
pub const DEFAULT_WEIGHT: i32 = 1000;

/// Convert an arbitrary JSON value into an object payload.
///
/// Scalars, arrays and `null` are rejected with `InvalidPayloadShape`
/// naming the offending field.
pub fn into_object(value: Value, field: PayloadField) -> Result<JsonObject, DocumentError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DocumentError::InvalidPayloadShape { field })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(utils::generate_uuid())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(Uuid);

impl SchemaId {
    pub fn new() -> Self {
        Self(utils::generate_uuid())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SchemaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a scope value (a region, site, role, tag, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeRef(String);

impl ScopeRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for ScopeRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ScopeRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a device or virtual machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TargetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of collaborators that may own documents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OwnerKind {
    GitRepository,
    Job
}

/// Reference to the collaborator that exclusively manages a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: OwnerKind,
    pub id: String
}

impl OwnerRef {
    pub fn new(kind: OwnerKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into()
        }
    }

    pub fn git_repository(id: impl Into<String>) -> Self {
        Self::new(OwnerKind::GitRepository, id)
    }

    pub fn job(id: impl Into<String>) -> Self {
        Self::new(OwnerKind::Job, id)
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Render an optional owner the way identity errors report it.
pub fn describe_owner(owner: Option<&OwnerRef>) -> String {
    owner.map_or_else(|| "(user-managed)".to_string(), ToString::to_string)
}

/// A named, weighted configuration payload restricted to a set of targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedDocument {
    pub id: DocumentId,
    pub name: String,
    pub weight: i32,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    pub data: JsonObject,
    #[serde(default)]
    pub schema: Option<SchemaId>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
    #[serde(default)]
    pub scope: ScopeRestrictions
}

impl ScopedDocument {
    pub fn new(name: impl Into<String>, data: JsonObject) -> Self {
        Self {
            id: DocumentId::new(),
            name: name.into(),
            weight: DEFAULT_WEIGHT,
            description: String::new(),
            is_active: true,
            data,
            schema: None,
            owner: None,
            scope: ScopeRestrictions::default()
        }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ScopeRestrictions) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: OwnerRef) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: SchemaId) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether `other` describes the same `(name, owner)` identity.
    pub fn same_identity(&self, name: &str, owner: Option<&OwnerRef>) -> bool {
        self.name == name && self.owner.as_ref() == owner
    }

    /// Whether two documents carry the same user-visible content, ignoring ids.
    pub fn same_content(&self, other: &ScopedDocument) -> bool {
        self.name == other.name
            && self.weight == other.weight
            && self.description == other.description
            && self.is_active == other.is_active
            && self.data == other.data
            && self.schema == other.schema
            && self.owner == other.owner
            && self.scope == other.scope
    }
}

/// Unvalidated input for creating or updating a scoped document.
///
/// `data` is a raw JSON value so that shape errors surface as
/// `InvalidPayloadShape` at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub data: Value,
    #[serde(default)]
    pub schema: Option<SchemaId>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
    #[serde(default)]
    pub scope: ScopeRestrictions
}

fn default_weight() -> i32 {
    DEFAULT_WEIGHT
}

fn default_active() -> bool {
    true
}

impl DocumentDraft {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            weight: DEFAULT_WEIGHT,
            description: String::new(),
            is_active: true,
            data,
            schema: None,
            owner: None,
            scope: ScopeRestrictions::default()
        }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ScopeRestrictions) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: OwnerRef) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: SchemaId) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Check the payload shape and build a document with the given id.
    pub fn into_document(self, id: DocumentId) -> Result<ScopedDocument, DocumentError> {
        Ok(ScopedDocument {
            id,
            name: self.name,
            weight: self.weight,
            description: self.description,
            is_active: self.is_active,
            data: into_object(self.data, PayloadField::Data)?,
            schema: self.schema,
            owner: self.owner,
            scope: self.scope
        })
    }
}

/// A named JSON Schema (Draft-07) that payloads can be bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaContract {
    pub id: SchemaId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub schema: Value
}

impl SchemaContract {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            id: SchemaId::new(),
            name: name.into(),
            description: String::new(),
            schema
        }
    }

    /// Content fingerprint of the schema body, used to key compiled
    /// validators.
    pub fn fingerprint(&self) -> String {
        utils::compute_json_hash(&self.schema)
    }
}

/// Per-target payload that always wins over scoped documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalOverride {
    pub data: JsonObject,
    #[serde(default)]
    pub schema: Option<SchemaId>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetKind {
    Device,
    VirtualMachine
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Device {
    pub id: TargetId,
    pub name: String,
    pub region: Option<ScopeRef>,
    pub site: Option<ScopeRef>,
    pub role: Option<ScopeRef>,
    pub device_type: Option<ScopeRef>,
    pub platform: Option<ScopeRef>,
    pub cluster_group: Option<ScopeRef>,
    pub cluster: Option<ScopeRef>,
    pub tenant_group: Option<ScopeRef>,
    pub tenant: Option<ScopeRef>,
    #[serde(default)]
    pub tags: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub local_override: Option<LocalOverride>
}

impl Device {
    pub fn new(id: impl Into<TargetId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Virtual machines always live in a cluster and never have a device type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: TargetId,
    pub name: String,
    pub cluster: ScopeRef,
    pub cluster_group: Option<ScopeRef>,
    pub region: Option<ScopeRef>,
    pub site: Option<ScopeRef>,
    pub role: Option<ScopeRef>,
    pub platform: Option<ScopeRef>,
    pub tenant_group: Option<ScopeRef>,
    pub tenant: Option<ScopeRef>,
    #[serde(default)]
    pub tags: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub local_override: Option<LocalOverride>
}

impl VirtualMachine {
    pub fn new(
        id: impl Into<TargetId>,
        name: impl Into<String>,
        cluster: impl Into<ScopeRef>
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cluster: cluster.into(),
            ..Default::default()
        }
    }
}

impl ContextTarget for Device {
    fn target_id(&self) -> &TargetId {
        &self.id
    }

    fn kind(&self) -> TargetKind {
        TargetKind::Device
    }

    fn scope_attributes(&self) -> ScopeAttributes {
        ScopeAttributes {
            target_id: self.id.clone(),
            region: self.region.clone(),
            site: self.site.clone(),
            role: self.role.clone(),
            device_type: self.device_type.clone(),
            platform: self.platform.clone(),
            cluster_group: self.cluster_group.clone(),
            cluster: self.cluster.clone(),
            tenant_group: self.tenant_group.clone(),
            tenant: self.tenant.clone(),
            tags: self.tags.clone()
        }
    }

    fn local_override(&self) -> Option<&LocalOverride> {
        self.local_override.as_ref()
    }

    fn set_local_override(&mut self, local_override: Option<LocalOverride>) {
        self.local_override = local_override;
    }
}

impl ContextTarget for VirtualMachine {
    fn target_id(&self) -> &TargetId {
        &self.id
    }

    fn kind(&self) -> TargetKind {
        TargetKind::VirtualMachine
    }

    fn scope_attributes(&self) -> ScopeAttributes {
        ScopeAttributes {
            target_id: self.id.clone(),
            region: self.region.clone(),
            site: self.site.clone(),
            role: self.role.clone(),
            device_type: None,
            platform: self.platform.clone(),
            cluster_group: self.cluster_group.clone(),
            cluster: Some(self.cluster.clone()),
            tenant_group: self.tenant_group.clone(),
            tenant: self.tenant.clone(),
            tags: self.tags.clone()
        }
    }

    fn local_override(&self) -> Option<&LocalOverride> {
        self.local_override.as_ref()
    }

    fn set_local_override(&mut self, local_override: Option<LocalOverride>) {
        self.local_override = local_override;
    }
}

/// Either kind of target, for heterogeneous batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetEntity {
    Device(Device),
    VirtualMachine(VirtualMachine)
}

impl ContextTarget for TargetEntity {
    fn target_id(&self) -> &TargetId {
        match self {
            TargetEntity::Device(d) => d.target_id(),
            TargetEntity::VirtualMachine(vm) => vm.target_id()
        }
    }

    fn kind(&self) -> TargetKind {
        match self {
            TargetEntity::Device(_) => TargetKind::Device,
            TargetEntity::VirtualMachine(_) => TargetKind::VirtualMachine
        }
    }

    fn scope_attributes(&self) -> ScopeAttributes {
        match self {
            TargetEntity::Device(d) => d.scope_attributes(),
            TargetEntity::VirtualMachine(vm) => vm.scope_attributes()
        }
    }

    fn local_override(&self) -> Option<&LocalOverride> {
        match self {
            TargetEntity::Device(d) => d.local_override(),
            TargetEntity::VirtualMachine(vm) => vm.local_override()
        }
    }

    fn set_local_override(&mut self, local_override: Option<LocalOverride>) {
        match self {
            TargetEntity::Device(d) => d.set_local_override(local_override),
            TargetEntity::VirtualMachine(vm) => vm.set_local_override(local_override)
        }
    }
}

impl From<Device> for TargetEntity {
    fn from(device: Device) -> Self {
        TargetEntity::Device(device)
    }
}

impl From<VirtualMachine> for TargetEntity {
    fn from(vm: VirtualMachine) -> Self {
        TargetEntity::VirtualMachine(vm)
    }
}
