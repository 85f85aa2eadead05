//! The schema data model: the backend's view, the store's view, and the
//! combined view the dispatcher returns to callers.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ident::{NameIdent, Namespace};
use crate::identity::IDENTITY_TAG_KEY;

/// The backend's authoritative view of a schema's structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub comment: Option<String>,
    pub properties: HashMap<String, String>,
}

impl Schema {
    pub fn new(name: impl Into<String>, comment: Option<String>, properties: HashMap<String, String>) -> Self {
        Self { name: name.into(), comment, properties }
    }
}

/// One property mutation requested through `alterSchema`. `RenameSchema`
/// exists in the wire-level vocabulary only so the dispatcher has something
/// concrete to reject: schema rename is unsupported at this layer and is
/// validated away before any backend or store call ever sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaChange {
    SetProperty { key: String, value: String },
    RemoveProperty { key: String },
    RenameSchema { new_name: String },
}

/// Audit trail held by the entity store, authoritative over anything a
/// backend might also report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub creator: String,
    pub create_time: DateTime<Utc>,
    pub last_modifier: Option<String>,
    pub last_modified_time: Option<DateTime<Utc>>,
}

impl Audit {
    pub fn created_by(creator: impl Into<String>, create_time: DateTime<Utc>) -> Self {
        Self { creator: creator.into(), create_time, last_modifier: None, last_modified_time: None }
    }
}

/// The store's view of a schema: stable identity plus audit, keyed by full
/// name with a secondary index by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntity {
    pub id: u64,
    pub name: String,
    pub namespace: Namespace,
    pub audit: Audit,
}

impl SchemaEntity {
    pub fn ident(&self) -> NameIdent {
        self.namespace.child(self.name.clone())
    }
}

/// The per-request composite returned by every dispatcher operation.
///
/// Invariant: if `entity` is `Some`, `entity.id` equals the identity tag
/// parsed from `backend.properties` whenever such a tag exists. Invariant:
/// `hidden_keys` is a subset of `backend.properties`'s keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedSchema {
    pub backend: Schema,
    pub entity: Option<SchemaEntity>,
    pub hidden_keys: HashSet<String>,
    pub imported: bool,
}

impl CombinedSchema {
    /// Builds the combined view. `audit` prefers the entity's audit record
    /// over anything the backend might separately report (the backend has
    /// no audit concept in this model, so this is really "use the entity's
    /// audit if we have one"). `properties()` strips the identity tag; hidden
    /// keys are tracked alongside rather than removed, so masking stays a
    /// presentation-layer choice.
    pub fn build(backend: Schema, entity: Option<SchemaEntity>, hidden_keys: HashSet<String>, imported: bool) -> Self {
        Self { backend, entity, hidden_keys, imported }
    }

    /// Properties presentable to an end user: the identity tag stripped,
    /// hidden keys left in place (callers that want masking consult
    /// `hidden_keys` themselves).
    pub fn presentable_properties(&self) -> HashMap<String, String> {
        self.backend
            .properties
            .iter()
            .filter(|(k, _)| k.as_str() != IDENTITY_TAG_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn audit(&self) -> Option<&Audit> {
        self.entity.as_ref().map(|e| &e.audit)
    }
}
