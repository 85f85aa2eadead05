//! The hierarchical lock manager.
//!
//! A trie of reader/writer locks keyed by name path. Acquiring a lock on
//! path `P` in mode `M` acquires every ancestor of `P` in shared mode and
//! `P` itself in mode `M`. Acquisition walks root-to-leaf, which is what
//! gives the manager deadlock freedom: two operations that both touch an
//! overlapping subtree always take its locks in the same order. Nodes are
//! reference-counted `Arc<tokio::sync::RwLock<()>>` wrappers and are
//! removed from the trie once unheld with no other acquisition in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

struct LockNode {
    lock: Arc<RwLock<()>>,
    refcount: AtomicUsize,
}

impl LockNode {
    fn new() -> Self {
        Self { lock: Arc::new(RwLock::new(())), refcount: AtomicUsize::new(0) }
    }
}

enum HeldGuard {
    Read(OwnedRwLockReadGuard<()>),
    Write(OwnedRwLockWriteGuard<()>),
}

/// Tree-structured reader/writer lock keyed by dotted name paths.
#[derive(Default)]
pub struct LockManager {
    nodes: DashMap<String, Arc<LockNode>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self { nodes: DashMap::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { nodes: DashMap::with_capacity(capacity) }
    }

    fn path_key(levels: &[String]) -> String {
        levels.join(".")
    }

    /// Returns the node for `key`, creating it if absent, and bumps its
    /// refcount to reflect the acquisition about to happen.
    fn acquire_node(&self, key: &str) -> Arc<LockNode> {
        let node = self
            .nodes
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(LockNode::new()))
            .clone();
        node.refcount.fetch_add(1, Ordering::SeqCst);
        node
    }

    fn release_node(&self, key: &str) {
        if let Some(entry) = self.nodes.get(key) {
            let node = entry.value().clone();
            drop(entry);
            if node.refcount.fetch_sub(1, Ordering::SeqCst) == 1 {
                // We were the last acquirer; remove the trie entry if it is
                // still at zero (a concurrent acquire may have raced us).
                self.nodes.remove_if(key, |_, v| {
                    Arc::ptr_eq(v, &node) && v.refcount.load(Ordering::SeqCst) == 0
                });
            }
        }
    }

    /// Acquires ancestors of `path` in shared mode and `path` itself in
    /// `mode`. `path` must be non-empty.
    pub async fn acquire(&self, path: &[String], mode: LockMode) -> LockGuard<'_> {
        assert!(!path.is_empty(), "cannot lock an empty path");
        let mut keys = Vec::with_capacity(path.len());
        let mut guards = Vec::with_capacity(path.len());

        for depth in 1..path.len() {
            let key = Self::path_key(&path[..depth]);
            let node = self.acquire_node(&key);
            let guard = node.lock.clone().read_owned().await;
            keys.push(key);
            guards.push(HeldGuard::Read(guard));
        }

        let leaf_key = Self::path_key(path);
        let leaf_node = self.acquire_node(&leaf_key);
        let leaf_guard = match mode {
            LockMode::Read => HeldGuard::Read(leaf_node.lock.clone().read_owned().await),
            LockMode::Write => HeldGuard::Write(leaf_node.lock.clone().write_owned().await),
        };
        keys.push(leaf_key);
        guards.push(leaf_guard);

        LockGuard { manager: self, keys, _guards: guards }
    }

    /// Number of trie nodes currently tracked. Exposed for tests asserting
    /// that released, unwaited-on subtrees are reclaimed.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// RAII handle releasing every lock acquired by one [`LockManager::acquire`]
/// call when dropped, regardless of which exit path is taken.
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    keys: Vec<String>,
    _guards: Vec<HeldGuard>,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        // Guards must be released before the refcount drops, so we drop
        // them explicitly here ahead of releasing nodes; Rust already runs
        // field drops in declaration order after this body, but making it
        // explicit keeps the release-order invariant visible.
        self._guards.clear();
        for key in self.keys.iter().rev() {
            self.manager.release_node(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(levels: &[&str]) -> Vec<String> {
        levels.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn readers_on_the_same_leaf_do_not_block_each_other() {
        let mgr = LockManager::new();
        let g1 = mgr.acquire(&path(&["lake", "pg"]), LockMode::Read).await;
        let g2 = mgr.acquire(&path(&["lake", "pg"]), LockMode::Read).await;
        drop(g1);
        drop(g2);
    }

    #[tokio::test]
    async fn write_on_leaf_excludes_concurrent_write() {
        let mgr = Arc::new(LockManager::new());
        let g1 = mgr.acquire(&path(&["lake", "pg", "s1"]), LockMode::Write).await;

        let mgr2 = mgr.clone();
        let handle = tokio::spawn(async move {
            let _g2 = mgr2.acquire(&path(&["lake", "pg", "s1"]), LockMode::Write).await;
        });

        // give the spawned task a chance to block on the held write lock
        tokio::task::yield_now().await;
        drop(g1);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn nodes_are_reclaimed_once_unheld() {
        let mgr = LockManager::new();
        {
            let _g = mgr.acquire(&path(&["lake", "pg", "s1"]), LockMode::Write).await;
            assert_eq!(mgr.node_count(), 3);
        }
        assert_eq!(mgr.node_count(), 0);
    }

    #[tokio::test]
    async fn ancestor_is_shared_even_under_a_write_leaf() {
        let mgr = Arc::new(LockManager::new());
        // WRITE on ["lake", "pg", "s1"] only excludes other acquisitions at
        // the same leaf; a READ on the ancestor ["lake", "pg"] must still be
        // obtainable concurrently.
        let _write_guard = mgr.acquire(&path(&["lake", "pg", "s1"]), LockMode::Write).await;
        let _read_guard = mgr.acquire(&path(&["lake", "pg"]), LockMode::Read).await;
    }
}
