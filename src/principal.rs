//! The principal/auth and clock context the dispatcher consults for audit
//! fields.
//!
//! The real principal/auth context is an external collaborator; this trait
//! is the narrow slice of it the dispatcher needs, kept separate from the
//! clock so tests can fix identity and time independently.

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub trait PrincipalContext: Send + Sync {
    /// The identity to attribute a create/alter to.
    fn current_principal(&self) -> String;

    /// The current time, injected so audit timestamps are deterministic
    /// under test.
    fn now(&self) -> DateTime<Utc>;
}

pub type PrincipalContextRef = Arc<dyn PrincipalContext>;
