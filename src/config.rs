//! Dispatcher-level runtime configuration.
//!
//! This is not a general application config — the crate has no `main`; the
//! REST/CLI façade that owns configuration loading constructs a
//! [`DispatcherConfig`] and passes it in, consumed the way a leaf crate
//! consumes a `toml`-backed config fragment rather than owning it.

use serde::{Deserialize, Serialize};

/// Controls whether a reconciliation log line that represents a tolerated,
/// self-healing inconsistency is logged at `warn` (default) or `error`
/// (for operators who want these to page).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationLogLevel {
    Warn,
    Error,
}

impl Default for ReconciliationLogLevel {
    fn default() -> Self {
        ReconciliationLogLevel::Warn
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Seed value for the in-process id generator. Tests pin this to get
    /// deterministic ids; production wiring leaves it at `0`.
    pub id_generator_start: u64,

    /// Initial capacity hint for the lock manager's path trie. Purely an
    /// allocation-avoidance tunable; the trie grows unbounded regardless.
    pub lock_table_capacity_hint: usize,

    /// Log level used for store-hiccup / reconciliation warnings
    /// (`{op, ident, phase, cause}` correlation lines).
    pub reconciliation_log_level: ReconciliationLogLevel,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            id_generator_start: 0,
            lock_table_capacity_hint: 64,
            reconciliation_log_level: ReconciliationLogLevel::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
