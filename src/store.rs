//! The entity store adapter.
//!
//! The store is the source of truth for identity and audit only; the
//! backend is the source of truth for structure and properties. This trait
//! is the typed CRUD surface the dispatcher needs against it; the actual
//! transactional key-value store is an external collaborator —
//! `testing::InMemoryEntityStore` is the in-crate fake used by tests and by
//! callers wiring up an example.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::SchemaEntity;

/// Typed CRUD on schema entities, keyed by full name or by id. Every method
/// must be atomic with respect to concurrent calls on the same key —
/// implementations backed by a real transactional store get this for free;
/// `testing::InMemoryEntityStore` provides it with a mutex.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Idempotent upsert by full name. When `overwrite` is false and a
    /// different entity already occupies the name, implementations should
    /// fail; the dispatcher always calls this with `overwrite = true`.
    async fn put(&self, entity: SchemaEntity, overwrite: bool) -> Result<()>;

    /// Looks up an entity by its full dotted name. Returns `Ok(None)` rather
    /// than an error when absent — only `update`/`delete` treat absence as
    /// failure.
    async fn get(&self, name: &str) -> Result<Option<SchemaEntity>>;

    /// Looks up an entity by its stable id. Returns `Ok(None)` when absent,
    /// same as [`EntityStore::get`].
    async fn get_by_id(&self, id: u64) -> Result<Option<SchemaEntity>>;

    /// Reads the entity bound to `id`, applies `f`, and writes the result
    /// back. Fails with [`crate::error::Error::StoreNotFound`] if `id` is
    /// absent.
    async fn update(
        &self,
        id: u64,
        f: Box<dyn FnOnce(SchemaEntity) -> SchemaEntity + Send>,
    ) -> Result<SchemaEntity>;

    /// Deletes the entity keyed by `name`. Fails with
    /// [`crate::error::Error::StoreNotFound`] if the key is absent; the
    /// dispatcher's `dropSchema` path swallows that specific failure.
    async fn delete(&self, name: &str) -> Result<bool>;
}

pub type EntityStoreRef = Arc<dyn EntityStore>;
