//! The dispatcher core: the five schema operations, their reconciliation
//! rules against the entity store, and the import protocol that lets a
//! store row be re-established after the backend changed behind the
//! dispatcher's back.
//!
//! Each operation follows the same shape: resolve a handle, take the lock,
//! delegate to the backend, log each reconciliation branch, fold the
//! result into a typed view.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::DispatcherConfig;
use crate::error::{
    Error, IllegalArgumentSnafu, MultipleCatalogsManageSchemaSnafu, Result, StoreFailureSnafu,
};
use crate::ident::{NameIdent, Namespace};
use crate::idgen::IdGeneratorRef;
use crate::identity;
use crate::lock::{LockManager, LockMode};
use crate::principal::PrincipalContextRef;
use crate::router::CatalogRouterRef;
use crate::schema::{Audit, CombinedSchema, SchemaChange, SchemaEntity};
use crate::store::EntityStoreRef;

/// The coordination core of the metadata catalog service. Routes each
/// schema-scoped operation to its owning backend, serializes it through the
/// hierarchical lock, and reconciles the backend's authoritative view with
/// the entity store.
pub struct SchemaDispatcher {
    router: CatalogRouterRef,
    store: EntityStoreRef,
    locks: LockManager,
    id_gen: IdGeneratorRef,
    principal: PrincipalContextRef,
    config: DispatcherConfig,
}

impl SchemaDispatcher {
    pub fn new(
        router: CatalogRouterRef,
        store: EntityStoreRef,
        id_gen: IdGeneratorRef,
        principal: PrincipalContextRef,
        config: DispatcherConfig,
    ) -> Self {
        let locks = LockManager::with_capacity(config.lock_table_capacity_hint);
        Self { router, store, locks, id_gen, principal, config }
    }

    fn log_reconciliation(&self, op: &str, ident: &str, phase: &str, cause: &str) {
        match self.config.reconciliation_log_level {
            crate::config::ReconciliationLogLevel::Warn => {
                warn!(op, ident, phase, cause, "reconciliation event")
            }
            crate::config::ReconciliationLogLevel::Error => {
                tracing::error!(op, ident, phase, cause, "reconciliation event")
            }
        }
    }

    // ---- 4.6.1 listSchemas ----------------------------------------------

    pub async fn list_schemas(&self, ns: &Namespace) -> Result<Vec<NameIdent>> {
        if ns.len() != 2 {
            return IllegalArgumentSnafu {
                message: format!("listSchemas requires a 2-level namespace, got {ns}"),
            }
            .fail();
        }

        let _guard = self.locks.acquire(ns.levels(), LockMode::Read).await;

        let catalog_ident = NameIdent::new(ns.levels().to_vec());
        let handle = self.router.resolve(&catalog_ident).await?;
        let idents = handle.schema_ops().list_schemas(ns).await?;
        info!(op = "listSchemas", ns = %ns, count = idents.len(), "listed schemas");
        Ok(idents)
    }

    // ---- 4.6.2 createSchema ----------------------------------------------

    pub async fn create_schema(
        &self,
        ident: &NameIdent,
        comment: Option<&str>,
        properties: HashMap<String, String>,
    ) -> Result<CombinedSchema> {
        let handle = self.router.resolve(ident).await?;
        handle.properties_metadata().validate(&properties)?;

        let uid = self.id_gen.next();
        let injected_properties = identity::inject_into(&properties, uid);

        let catalog_path = ident.catalog_namespace();
        let _guard = self.locks.acquire(catalog_path.levels(), LockMode::Write).await;

        let backend_schema = handle
            .schema_ops()
            .create_schema(ident, comment, injected_properties)
            .await?;
        let hidden_keys = handle.properties_metadata().hidden_keys(&backend_schema.properties);

        if handle.schema_scope_managed() {
            info!(op = "createSchema", ident = %ident, "managed catalog, no store write");
            return Ok(CombinedSchema::build(backend_schema, None, hidden_keys, false));
        }

        let entity = SchemaEntity {
            id: uid,
            name: ident.leaf().to_string(),
            namespace: ident.namespace(),
            audit: Audit::created_by(self.principal.current_principal(), self.principal.now()),
        };

        match self.store.put(entity.clone(), true).await {
            Ok(()) => {
                info!(op = "createSchema", ident = %ident, id = uid, "store entity created");
                Ok(CombinedSchema::build(backend_schema, Some(entity), hidden_keys, false))
            }
            Err(e) => {
                // The backend already created the schema; a store hiccup
                // must not turn a successful create into a user-visible
                // failure. The next `loadSchema` self-heals via import.
                self.log_reconciliation("createSchema", &ident.to_string(), "store-write", &e.to_string());
                Ok(CombinedSchema::build(backend_schema, None, hidden_keys, false))
            }
        }
    }

    // ---- 4.6.3 loadSchema / import ---------------------------------------

    pub async fn load_schema(&self, ident: &NameIdent) -> Result<CombinedSchema> {
        let mut combined = {
            let _guard = self.locks.acquire(ident.levels(), LockMode::Read).await;
            self.internal_load(ident).await?
        };

        if combined.imported {
            return Ok(combined);
        }

        let catalog_path = ident.catalog_namespace();
        let _guard = self.locks.acquire(catalog_path.levels(), LockMode::Write).await;
        let entity = self.import(ident).await?;

        // `import` succeeded and returns the entity it just wrote, keyed
        // under `ident`'s current name — the pre-import `combined.entity`
        // (if any) still carries the stale name from before the rename, so
        // it must be replaced rather than merely flagged.
        combined.entity = Some(entity);
        combined.imported = true;
        Ok(combined)
    }

    async fn internal_load(&self, ident: &NameIdent) -> Result<CombinedSchema> {
        let handle = self.router.resolve(ident).await?;
        let backend_schema = handle.schema_ops().load_schema(ident).await?;
        let hidden_keys = handle.properties_metadata().hidden_keys(&backend_schema.properties);

        if handle.schema_scope_managed() {
            return Ok(CombinedSchema::build(backend_schema, None, hidden_keys, true));
        }

        let entity = match identity::extract(&backend_schema.properties) {
            None => self.store.get(&ident.to_string()).await?,
            Some(id) => self.store.get_by_id(id).await?,
        };
        // An entity found by id is only "already imported" if it is keyed
        // under *this* ident; one found under a stale name (external
        // rename) or a foreign namespace (multi-catalog conflict) still
        // needs the import path to run — see DESIGN.md.
        let imported = entity
            .as_ref()
            .map(|e| e.namespace == ident.namespace() && e.name == ident.leaf())
            .unwrap_or(false);
        Ok(CombinedSchema::build(backend_schema, entity, hidden_keys, imported))
    }

    async fn import(&self, ident: &NameIdent) -> Result<SchemaEntity> {
        let combined = self.internal_load(ident).await?;
        if combined.imported {
            // A concurrent `loadSchema` already imported this entity between
            // this call's read and its acquisition of the write lock;
            // `internal_load` only reports `imported = true` when `entity`
            // is present and keyed under `ident`.
            return Ok(combined.entity.expect("imported implies entity is present"));
        }

        let tag = identity::extract(&combined.backend.properties);
        let uid = tag.unwrap_or_else(|| self.id_gen.next());

        if tag.is_some() {
            // A tag survived on the backend but no entity exists under
            // either its name or its id: the backend was renamed
            // externally and the store row must follow it.
            self.log_reconciliation(
                "loadSchema",
                &ident.to_string(),
                "import",
                &format!(
                    "identity tag {uid} present but no matching store entity; treating as external rename"
                ),
            );
        }

        // `Schema` (the backend view) carries no audit fields, so audit is
        // always synthesized here rather than copied from the backend.
        let entity = SchemaEntity {
            id: uid,
            name: ident.leaf().to_string(),
            namespace: ident.namespace(),
            audit: Audit::created_by(self.principal.current_principal(), self.principal.now()),
        };

        match self.store.put(entity.clone(), true).await {
            Ok(()) => {
                info!(op = "loadSchema", ident = %ident, id = uid, phase = "import", "store entity imported");
                Ok(entity)
            }
            Err(Error::EntityAlreadyExists { id, .. }) => MultipleCatalogsManageSchemaSnafu {
                ident: ident.to_string(),
                id,
            }
            .fail(),
            Err(e) => StoreFailureSnafu { ident: ident.to_string(), message: e.to_string() }.fail(),
        }
    }

    // ---- 4.6.4 alterSchema -------------------------------------------------

    pub async fn alter_schema(&self, ident: &NameIdent, changes: &[SchemaChange]) -> Result<CombinedSchema> {
        if changes.iter().any(|c| matches!(c, SchemaChange::RenameSchema { .. })) {
            return IllegalArgumentSnafu {
                message: format!("alterSchema does not support renaming {ident}"),
            }
            .fail();
        }

        // Deliberately does not re-lock the catalog parent even though some
        // backend's property changes could have side effects visible at
        // that scope.
        let _guard = self.locks.acquire(ident.levels(), LockMode::Write).await;

        let handle = self.router.resolve(ident).await?;
        let property_changes: HashMap<String, String> = changes
            .iter()
            .filter_map(|c| match c {
                SchemaChange::SetProperty { key, value } => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect();
        handle.properties_metadata().validate(&property_changes)?;

        let backend_schema = handle.schema_ops().alter_schema(ident, changes).await?;
        let hidden_keys = handle.properties_metadata().hidden_keys(&backend_schema.properties);

        if handle.schema_scope_managed() {
            return Ok(CombinedSchema::build(backend_schema, None, hidden_keys, false));
        }

        let store_id = match identity::extract(&backend_schema.properties) {
            Some(id) => Some(id),
            None => match self.store.get(&ident.to_string()).await {
                Ok(entity) => entity.map(|e| e.id),
                Err(e) => {
                    // The backend already applied the change; a store lookup
                    // hiccup must not turn a successful alter into a
                    // user-visible failure.
                    self.log_reconciliation("alterSchema", &ident.to_string(), "store-lookup", &e.to_string());
                    None
                }
            },
        };

        let Some(id) = store_id else {
            return Ok(CombinedSchema::build(backend_schema, None, hidden_keys, false));
        };

        let principal = self.principal.current_principal();
        let now = self.principal.now();
        let update_result = self
            .store
            .update(
                id,
                Box::new(move |mut entity| {
                    entity.audit.last_modifier = Some(principal.clone());
                    entity.audit.last_modified_time = Some(now);
                    entity
                }),
            )
            .await;

        match update_result {
            Ok(updated) => Ok(CombinedSchema::build(backend_schema, Some(updated), hidden_keys, false)),
            Err(e) => {
                // Same reasoning as the lookup above: the backend already
                // committed the alter, so a store-write hiccup degrades the
                // combined view rather than failing the call.
                self.log_reconciliation("alterSchema", &ident.to_string(), "store-write", &e.to_string());
                Ok(CombinedSchema::build(backend_schema, None, hidden_keys, false))
            }
        }
    }

    // ---- 4.6.5 dropSchema ---------------------------------------------------

    pub async fn drop_schema(&self, ident: &NameIdent, cascade: bool) -> Result<bool> {
        let catalog_path = ident.catalog_namespace();
        let _guard = self.locks.acquire(catalog_path.levels(), LockMode::Write).await;

        let handle = self.router.resolve(ident).await?;
        let dropped = handle.schema_ops().drop_schema(ident, cascade).await?;

        if handle.schema_scope_managed() {
            return Ok(dropped);
        }

        match self.store.delete(&ident.to_string()).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                self.log_reconciliation("dropSchema", &ident.to_string(), "store-delete", &e.to_string());
            }
            Err(e) => return Err(e),
        }

        // The store's outcome never affects the return value — backend
        // success is authoritative.
        Ok(dropped)
    }
}
