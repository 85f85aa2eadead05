//! Error taxonomy surfaced by the dispatcher.
//!
//! One variant per external error code callers can observe, plus the two
//! internal-only store conditions (`EntityAlreadyExists`, `StoreNotFound`)
//! that the entity store may raise and that the dispatcher translates
//! before they ever reach a caller (see `dispatcher.rs`).

use snafu::{Backtrace, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("No such catalog: {catalog}"))]
    NoSuchCatalog { catalog: String, backtrace: Backtrace },

    #[snafu(display("No such schema: {ident}"))]
    NoSuchSchema { ident: String, backtrace: Backtrace },

    #[snafu(display("Schema already exists: {ident}"))]
    SchemaAlreadyExists { ident: String, backtrace: Backtrace },

    #[snafu(display("Schema is not empty: {ident}"))]
    NonEmptySchema { ident: String, backtrace: Backtrace },

    #[snafu(display("Illegal argument: {message}"))]
    IllegalArgument { message: String, backtrace: Backtrace },

    #[snafu(display(
        "Multiple catalogs claim to manage schema {ident} under the same identity (id {id}); \
         reduce to a single owning catalog"
    ))]
    MultipleCatalogsManageSchema { ident: String, id: u64, backtrace: Backtrace },

    /// A concrete backend adapter's catch-all for failures that don't map
    /// onto one of the named error codes above (e.g. a connection reset).
    /// Not produced by the fakes in `testing.rs`.
    #[snafu(display("Backend operation failed for {ident}: {cause}"))]
    Backend { ident: String, cause: String, backtrace: Backtrace },

    #[snafu(display("Store operation failed for {ident}: {message}"))]
    StoreFailure { ident: String, message: String, backtrace: Backtrace },

    #[snafu(display("Runtime error: {message}"))]
    Runtime { message: String, backtrace: Backtrace },

    /// Raised by [`crate::store::EntityStore::put`] when a `put` would
    /// clobber a different key already bound to the same id. Never surfaced
    /// past `dispatcher.rs`, which turns it into
    /// [`Error::MultipleCatalogsManageSchema`].
    #[snafu(display("Entity already exists under a different key for id {id}"))]
    EntityAlreadyExists { id: u64, backtrace: Backtrace },

    /// Raised by store `get`/`update`/`delete` when the key is absent.
    /// Callers in `dispatcher.rs` either propagate it as `Runtime` or
    /// deliberately swallow it (e.g. `dropSchema`'s best-effort delete).
    #[snafu(display("Store entry not found: {key}"))]
    StoreNotFound { key: String, backtrace: Backtrace },
}

impl Error {
    /// The stable error code a REST/CLI façade would map onto a wire status.
    /// Exists so the external error contract is explicit and testable; this
    /// crate never emits it itself.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NoSuchCatalog { .. } => "NoSuchCatalog",
            Error::NoSuchSchema { .. } => "NoSuchSchema",
            Error::SchemaAlreadyExists { .. } => "SchemaAlreadyExists",
            Error::NonEmptySchema { .. } => "NonEmptySchema",
            Error::IllegalArgument { .. } => "IllegalArgument",
            Error::MultipleCatalogsManageSchema { .. } => "MultipleCatalogsManageSchema",
            Error::Backend { .. } | Error::StoreFailure { .. } | Error::Runtime { .. } => "Runtime",
            Error::EntityAlreadyExists { .. } | Error::StoreNotFound { .. } => {
                "Runtime" // internal-only; never meant to escape the dispatcher
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::StoreNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
