//! In-memory fakes used by this crate's own test suite and by downstream
//! callers writing tests against [`crate::dispatcher::SchemaDispatcher`].
//! Exposed behind the `testing` Cargo feature, the same pattern used by
//! crates that depend on their own `testing` feature in dev-dependencies.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{EntityAlreadyExistsSnafu, Result, StoreNotFoundSnafu};
use crate::ident::{NameIdent, Namespace};
use crate::principal::PrincipalContext;
use crate::router::{CatalogHandle, CatalogRouter, PropertiesMetadata, SchemaOps};
use crate::schema::{Schema, SchemaChange, SchemaEntity};
use crate::store::EntityStore;
use snafu::OptionExt;

/// A clock-free, identity-fixed principal context for deterministic audit
/// assertions.
pub struct FakePrincipal {
    name: String,
    fixed_now: Mutex<DateTime<Utc>>,
}

impl FakePrincipal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fixed_now: Mutex::new(DateTime::UNIX_EPOCH) }
    }

    /// Advances the fake clock, e.g. between a create and a later alter, so
    /// tests can assert `lastModifiedTime > createTime`.
    pub fn advance(&self, seconds: i64) {
        let mut now = self.fixed_now.lock().unwrap();
        *now += chrono::Duration::seconds(seconds);
    }
}

impl PrincipalContext for FakePrincipal {
    fn current_principal(&self) -> String {
        self.name.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        *self.fixed_now.lock().unwrap()
    }
}

/// Reference entity store: two maps behind one mutex so `put`/`get`/
/// `update`/`delete` are each atomic with respect to each other, matching
/// the atomicity a real transactional store would provide.
#[derive(Default)]
pub struct InMemoryEntityStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    by_name: HashMap<String, SchemaEntity>,
    id_to_name: HashMap<u64, String>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(entity: &SchemaEntity) -> String {
        entity.ident().to_string()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn put(&self, entity: SchemaEntity, _overwrite: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let new_key = Self::full_key(&entity);

        if let Some(existing_key) = inner.id_to_name.get(&entity.id).cloned() {
            if existing_key != new_key {
                let existing = inner.by_name.get(&existing_key).expect("index consistency");
                if existing.namespace != entity.namespace {
                    // A different catalog already claims this id: this is
                    // the multi-catalog conflict the dispatcher turns into
                    // `MultipleCatalogsManageSchema`.
                    return EntityAlreadyExistsSnafu { id: entity.id }.fail();
                }
                // Same catalog, different leaf name: an external rename
                // the backend already went through. Move the row.
                inner.by_name.remove(&existing_key);
            }
        }

        inner.id_to_name.insert(entity.id, new_key.clone());
        inner.by_name.insert(new_key, entity);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<SchemaEntity>> {
        Ok(self.inner.lock().unwrap().by_name.get(name).cloned())
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<SchemaEntity>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.id_to_name.get(&id).and_then(|name| inner.by_name.get(name)).cloned())
    }

    async fn update(
        &self,
        id: u64,
        f: Box<dyn FnOnce(SchemaEntity) -> SchemaEntity + Send>,
    ) -> Result<SchemaEntity> {
        let mut inner = self.inner.lock().unwrap();
        let key = inner
            .id_to_name
            .get(&id)
            .cloned()
            .with_context(|| StoreNotFoundSnafu { key: id.to_string() })?;
        let existing = inner.by_name.remove(&key).expect("index consistency");
        let updated = f(existing);
        let new_key = Self::full_key(&updated);
        inner.id_to_name.insert(id, new_key.clone());
        inner.by_name.insert(new_key, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.by_name.remove(name) {
            Some(entity) => {
                inner.id_to_name.remove(&entity.id);
                Ok(true)
            }
            None => StoreNotFoundSnafu { key: name.to_string() }.fail(),
        }
    }
}

/// A configurable in-memory backend. One instance models one catalog's
/// schema-ops surface.
#[derive(Default)]
pub struct FakeSchemaOps {
    schemas: Mutex<HashMap<String, Schema>>,
    /// Idents whose `drop_schema` should fail with `NonEmptySchema` until
    /// explicitly cleared by the test.
    non_empty: Mutex<HashSet<String>>,
}

impl FakeSchemaOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_non_empty(&self, ident: &NameIdent) {
        self.non_empty.lock().unwrap().insert(ident.to_string());
    }

    /// Simulates a backend-side rename that preserves unknown properties
    /// (including the identity tag): moves the schema from `old` to `new`.
    pub fn rename_externally(&self, old: &NameIdent, new: &NameIdent) {
        let mut schemas = self.schemas.lock().unwrap();
        if let Some(mut schema) = schemas.remove(&old.to_string()) {
            schema.name = new.leaf().to_string();
            schemas.insert(new.to_string(), schema);
        }
    }

    /// Seeds a schema directly, bypassing `create_schema` — used to model
    /// backend state the dispatcher did not itself create (e.g. scenario 4's
    /// pre-existing out-of-band identity tags).
    pub fn seed(&self, ident: &NameIdent, schema: Schema) {
        self.schemas.lock().unwrap().insert(ident.to_string(), schema);
    }
}

#[async_trait]
impl SchemaOps for FakeSchemaOps {
    async fn list_schemas(&self, ns: &Namespace) -> Result<Vec<NameIdent>> {
        let prefix = format!("{ns}.");
        Ok(self
            .schemas
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .map(|k| NameIdent::new(k.split('.').map(|s| s.to_string()).collect()))
            .collect())
    }

    async fn create_schema(
        &self,
        ident: &NameIdent,
        comment: Option<&str>,
        properties: HashMap<String, String>,
    ) -> Result<Schema> {
        let mut schemas = self.schemas.lock().unwrap();
        let key = ident.to_string();
        if schemas.contains_key(&key) {
            return crate::error::SchemaAlreadyExistsSnafu { ident: key }.fail();
        }
        let schema = Schema::new(ident.leaf(), comment.map(str::to_string), properties);
        schemas.insert(key, schema.clone());
        Ok(schema)
    }

    async fn load_schema(&self, ident: &NameIdent) -> Result<Schema> {
        self.schemas
            .lock()
            .unwrap()
            .get(&ident.to_string())
            .cloned()
            .with_context(|| crate::error::NoSuchSchemaSnafu { ident: ident.to_string() })
    }

    async fn alter_schema(&self, ident: &NameIdent, changes: &[SchemaChange]) -> Result<Schema> {
        let mut schemas = self.schemas.lock().unwrap();
        let key = ident.to_string();
        let schema = schemas
            .get_mut(&key)
            .with_context(|| crate::error::NoSuchSchemaSnafu { ident: key.clone() })?;
        for change in changes {
            match change {
                SchemaChange::SetProperty { key, value } => {
                    schema.properties.insert(key.clone(), value.clone());
                }
                SchemaChange::RemoveProperty { key } => {
                    schema.properties.remove(key);
                }
                SchemaChange::RenameSchema { .. } => {
                    unreachable!("dispatcher rejects rename before calling the backend")
                }
            }
        }
        Ok(schema.clone())
    }

    async fn drop_schema(&self, ident: &NameIdent, _cascade: bool) -> Result<bool> {
        let key = ident.to_string();
        if self.non_empty.lock().unwrap().contains(&key) {
            return crate::error::NonEmptySchemaSnafu { ident: key }.fail();
        }
        Ok(self.schemas.lock().unwrap().remove(&key).is_some())
    }
}

/// Property metadata that accepts anything and declares no hidden keys,
/// unless configured with a specific disallowed key set.
#[derive(Default)]
pub struct FakePropertiesMetadata {
    disallowed_keys: HashSet<String>,
    hidden: HashSet<String>,
}

impl FakePropertiesMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disallow(mut self, key: impl Into<String>) -> Self {
        self.disallowed_keys.insert(key.into());
        self
    }

    pub fn hide(mut self, key: impl Into<String>) -> Self {
        self.hidden.insert(key.into());
        self
    }
}

impl PropertiesMetadata for FakePropertiesMetadata {
    fn validate(&self, properties: &HashMap<String, String>) -> Result<()> {
        for key in properties.keys() {
            if self.disallowed_keys.contains(key) {
                return crate::error::IllegalArgumentSnafu {
                    message: format!("unknown property key: {key}"),
                }
                .fail();
            }
        }
        Ok(())
    }

    fn hidden_keys(&self, properties: &HashMap<String, String>) -> HashSet<String> {
        self.hidden.iter().filter(|k| properties.contains_key(*k)).cloned().collect()
    }
}

/// A resolved catalog handle over one [`FakeSchemaOps`] instance.
pub struct FakeCatalogHandle {
    schema_ops: FakeSchemaOps,
    properties_metadata: FakePropertiesMetadata,
    managed: bool,
}

impl FakeCatalogHandle {
    pub fn unmanaged() -> Self {
        Self { schema_ops: FakeSchemaOps::new(), properties_metadata: FakePropertiesMetadata::new(), managed: false }
    }

    pub fn managed() -> Self {
        Self { schema_ops: FakeSchemaOps::new(), properties_metadata: FakePropertiesMetadata::new(), managed: true }
    }

    pub fn with_properties_metadata(mut self, metadata: FakePropertiesMetadata) -> Self {
        self.properties_metadata = metadata;
        self
    }

    pub fn backend(&self) -> &FakeSchemaOps {
        &self.schema_ops
    }
}

impl CatalogHandle for FakeCatalogHandle {
    fn schema_ops(&self) -> &dyn SchemaOps {
        &self.schema_ops
    }

    fn properties_metadata(&self) -> &dyn PropertiesMetadata {
        &self.properties_metadata
    }

    fn schema_scope_managed(&self) -> bool {
        self.managed
    }
}

/// Routes every identifier whose catalog name is registered to the handle
/// registered for it; anything else fails with `NoSuchCatalog`.
#[derive(Default)]
pub struct FakeCatalogRouter {
    catalogs: HashMap<String, std::sync::Arc<FakeCatalogHandle>>,
}

impl FakeCatalogRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, catalog_name: impl Into<String>, handle: FakeCatalogHandle) -> Self {
        self.catalogs.insert(catalog_name.into(), std::sync::Arc::new(handle));
        self
    }

    /// Convenience: a router with a single unmanaged catalog registered,
    /// returning the router so it can be handed to a dispatcher.
    pub fn with_unmanaged(_metalake: &str, catalog: &str) -> Self {
        Self::new().register(catalog, FakeCatalogHandle::unmanaged())
    }

    /// Convenience: a router with a single SCHEMA-managed catalog
    /// registered.
    pub fn with_managed(_metalake: &str, catalog: &str) -> Self {
        Self::new().register(catalog, FakeCatalogHandle::managed())
    }

    pub fn handle(&self, catalog_name: &str) -> std::sync::Arc<FakeCatalogHandle> {
        self.catalogs.get(catalog_name).cloned().expect("catalog not registered in test router")
    }
}

#[async_trait]
impl CatalogRouter for FakeCatalogRouter {
    async fn resolve(&self, ident: &NameIdent) -> Result<std::sync::Arc<dyn CatalogHandle>> {
        self.catalogs
            .get(ident.catalog_name())
            .cloned()
            .map(|h| h as std::sync::Arc<dyn CatalogHandle>)
            .with_context(|| crate::error::NoSuchCatalogSnafu { catalog: ident.catalog_name().to_string() })
    }
}
