//! Schema Operation Dispatcher — the coordination core of a federated
//! metadata catalog service.
//!
//! This crate routes schema-scoped metadata operations (`list`, `create`,
//! `load`, `alter`, `drop`) to the backend that owns them, reconciles the
//! backend's authoritative view against an internal entity store that
//! records stable identities and audit information, serializes concurrent
//! operations through a hierarchical lock, and recovers consistently when a
//! backend and the store disagree.
//!
//! REST/CLI façades, the catalog registry, concrete backend adapters, the
//! transactional entity store, property-metadata registries, id generators
//! and the principal/auth context are all external collaborators. This
//! crate defines the capability traits those collaborators implement and
//! the dispatcher that orchestrates them.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ident;
pub mod identity;
pub mod idgen;
pub mod lock;
pub mod principal;
pub mod router;
pub mod schema;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::DispatcherConfig;
pub use dispatcher::SchemaDispatcher;
pub use error::{Error, Result};
pub use ident::{NameIdent, Namespace};
pub use schema::{Audit, CombinedSchema, Schema, SchemaChange, SchemaEntity};
