//! Name identifiers and namespaces.
//!
//! A [`NameIdent`] is the ordered tuple of path levels `[metalake, catalog,
//! schema(, ...)]` that callers use to address an entity. A [`Namespace`] is
//! just the prefix of such a tuple; `listSchemas` is always addressed by a
//! two-level namespace (`[metalake, catalog]`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered, non-empty sequence of path levels identifying an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameIdent {
    levels: Vec<String>,
}

impl NameIdent {
    /// Builds an identifier from its levels. Panics if `levels` is empty;
    /// callers construct identifiers from compile-time-known shapes
    /// (`NameIdent::schema`, parsed CLI input), never from arbitrary data.
    pub fn new(levels: Vec<String>) -> Self {
        assert!(!levels.is_empty(), "a name identifier needs at least one level");
        Self { levels }
    }

    /// Convenience constructor for a 3-level schema identifier.
    pub fn schema(metalake: impl Into<String>, catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        Self::new(vec![metalake.into(), catalog.into(), schema.into()])
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// The last path level, e.g. the schema's own short name.
    pub fn leaf(&self) -> &str {
        self.levels.last().expect("non-empty by construction")
    }

    /// Everything but the last level, as a [`Namespace`].
    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.levels[..self.levels.len() - 1].to_vec())
    }

    /// The two-level catalog namespace `[metalake, catalog]` that owns this
    /// identifier, regardless of how deep the identifier itself is.
    pub fn catalog_namespace(&self) -> Namespace {
        assert!(self.levels.len() >= 2, "identifier has no owning catalog: {self}");
        Namespace::new(self.levels[..2].to_vec())
    }

    pub fn catalog_name(&self) -> &str {
        &self.levels[1]
    }

    pub fn metalake_name(&self) -> &str {
        &self.levels[0]
    }
}

impl fmt::Display for NameIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.levels.join("."))
    }
}

/// A prefix of a [`NameIdent`] — the scope an operation like `listSchemas`
/// is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    levels: Vec<String>,
}

impl Namespace {
    pub fn new(levels: Vec<String>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Appends a leaf level, producing the corresponding [`NameIdent`].
    pub fn child(&self, leaf: impl Into<String>) -> NameIdent {
        let mut levels = self.levels.clone();
        levels.push(leaf.into());
        NameIdent::new(levels)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.levels.join("."))
    }
}
