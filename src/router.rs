//! The catalog router and the capability surfaces it resolves.
//!
//! A resolved catalog exposes its schema operations and property metadata
//! as direct `&dyn SchemaOps` / `&dyn PropertiesMetadata` capability
//! objects rather than as callbacks — behaviorally identical to a
//! with-style accessor, but it keeps the hot path a single dynamic
//! dispatch instead of a closure indirection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::ident::NameIdent;
use crate::schema::{Schema, SchemaChange};

/// The schema-scoped surface every backend adapter implements. One
/// polymorphic call site dispatches to whichever concrete backend the
/// router resolved — a relational catalog, a table-format catalog, a
/// message-stream catalog, or a filesystem.
#[async_trait]
pub trait SchemaOps: Send + Sync {
    async fn list_schemas(&self, ns: &crate::ident::Namespace) -> Result<Vec<NameIdent>>;

    async fn create_schema(
        &self,
        ident: &NameIdent,
        comment: Option<&str>,
        properties: HashMap<String, String>,
    ) -> Result<Schema>;

    async fn load_schema(&self, ident: &NameIdent) -> Result<Schema>;

    async fn alter_schema(&self, ident: &NameIdent, changes: &[SchemaChange]) -> Result<Schema>;

    async fn drop_schema(&self, ident: &NameIdent, cascade: bool) -> Result<bool>;
}

/// Validates and classifies properties against a backend's declared schema
/// of allowed keys. A thin capability surface, kept separate from
/// `SchemaOps` because some backends share property metadata across entity
/// kinds while diverging on schema operations themselves.
pub trait PropertiesMetadata: Send + Sync {
    /// Fails with [`crate::error::Error::IllegalArgument`] on an unknown or
    /// ill-typed key.
    fn validate(&self, properties: &HashMap<String, String>) -> Result<()>;

    /// Property keys this backend declares confidential and that a
    /// combined view should track as hidden (not stripped from
    /// `properties`, merely flagged).
    fn hidden_keys(&self, properties: &HashMap<String, String>) -> std::collections::HashSet<String>;
}

/// A resolved handle to one backend-owning catalog: its schema-ops surface,
/// its properties metadata, and its capability flags.
pub trait CatalogHandle: Send + Sync {
    fn schema_ops(&self) -> &dyn SchemaOps;

    fn properties_metadata(&self) -> &dyn PropertiesMetadata;

    /// True when this catalog's backend is itself the store of record for
    /// SCHEMA — the dispatcher must never write a mirror entity for it
    /// (invariant I1).
    fn schema_scope_managed(&self) -> bool;
}

pub type CatalogHandleRef = Arc<dyn CatalogHandle>;

/// Resolves a name identifier to the catalog handle that owns it.
#[async_trait]
pub trait CatalogRouter: Send + Sync {
    /// Fails with [`crate::error::Error::NoSuchCatalog`] if no catalog is
    /// registered under `ident`'s owning namespace.
    async fn resolve(&self, ident: &NameIdent) -> Result<CatalogHandleRef>;
}

pub type CatalogRouterRef = Arc<dyn CatalogRouter>;
