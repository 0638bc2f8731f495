//! Caches scoped to the lifetime of a solution snapshot.

use std::hash::Hash;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::base::SolutionId;
use crate::hir::{Solution, WeakSolution};

struct SnapshotEntry<K, V> {
    solution: WeakSolution,
    values: FxHashMap<K, V>,
}

/// A map from `K` to `V` per solution snapshot.
///
/// Entries hold the snapshot weakly. Once every strong handle to a snapshot
/// is dropped, its entries are purged on the next write, so no explicit
/// invalidation is needed.
pub(crate) struct SnapshotCache<K, V> {
    entries: RwLock<FxHashMap<SolutionId, SnapshotEntry<K, V>>>,
}

impl<K, V> Default for SnapshotCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> SnapshotCache<K, V> {
    pub(crate) fn get(&self, solution: &Solution, key: &K) -> Option<V> {
        self.entries
            .read()
            .get(&solution.id())
            .and_then(|entry| entry.values.get(key))
            .cloned()
    }

    /// Insert unless another thread got there first; returns the stored value.
    pub(crate) fn insert(&self, solution: &Solution, key: K, value: V) -> V {
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.solution.is_alive());
        entries
            .entry(solution.id())
            .or_insert_with(|| SnapshotEntry {
                solution: solution.downgrade(),
                values: FxHashMap::default(),
            })
            .values
            .entry(key)
            .or_insert(value)
            .clone()
    }

    /// Cached value for `key`, computing it with `compute` on a miss.
    ///
    /// `compute` runs without holding the lock, so it may itself consult
    /// this cache. Concurrent misses may compute twice; the first stored
    /// value wins.
    pub(crate) fn get_or_try_insert_with<E>(
        &self,
        solution: &Solution,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(solution, &key) {
            return Ok(value);
        }
        let value = compute()?;
        Ok(self.insert(solution, key, value))
    }

    pub(crate) fn get_or_insert_with(
        &self,
        solution: &Solution,
        key: K,
        compute: impl FnOnce() -> V,
    ) -> V {
        let compute = || Ok::<_, std::convert::Infallible>(compute());
        match self.get_or_try_insert_with(solution, key, compute) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Number of snapshots with entries, dead ones included until purged.
    #[cfg(test)]
    pub(crate) fn snapshot_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::SolutionBuilder;

    fn solution() -> Solution {
        let mut b = SolutionBuilder::new();
        b.add_project("P");
        b.build().unwrap()
    }

    #[test]
    fn test_entries_are_per_snapshot() {
        let cache: SnapshotCache<u32, &'static str> = SnapshotCache::default();
        let first = solution();
        let second = solution();
        cache.insert(&first, 1, "first");
        assert_eq!(cache.get(&first, &1), Some("first"));
        assert_eq!(cache.get(&second, &1), None);
    }

    #[test]
    fn test_first_insert_wins() {
        let cache: SnapshotCache<u32, u32> = SnapshotCache::default();
        let s = solution();
        assert_eq!(cache.insert(&s, 7, 1), 1);
        assert_eq!(cache.insert(&s, 7, 2), 1);
        assert_eq!(cache.get_or_insert_with(&s, 7, || 3), 1);
    }

    #[test]
    fn test_dead_snapshots_are_purged() {
        let cache: SnapshotCache<u32, u32> = SnapshotCache::default();
        let dropped = solution();
        cache.insert(&dropped, 1, 1);
        drop(dropped);

        let live = solution();
        cache.insert(&live, 1, 1);
        assert_eq!(cache.snapshot_count(), 1);
    }
}
