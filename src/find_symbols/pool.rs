//! Pooled scratch collections.

use std::hash::{BuildHasher, Hash};
use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::base::{DocumentId, SymbolId};

/// Worklists for the cascade closures.
pub(crate) static SYMBOL_STACKS: Lazy<Pool<Vec<SymbolId>>> = Lazy::new(|| Pool::new(32));

/// Per-project document -> symbols maps built by the search engine.
pub(crate) static DOCUMENT_MAPS: Lazy<Pool<IndexMap<DocumentId, Vec<SymbolId>>>> =
    Lazy::new(|| Pool::new(16));

/// A collection that can be cleared for reuse.
pub trait Poolable: Default {
    fn reset(&mut self);
}

impl<T> Poolable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<K: Hash + Eq, V, S: BuildHasher + Default> Poolable for IndexMap<K, V, S> {
    fn reset(&mut self) {
        self.clear();
    }
}

/// A bounded stack of reusable values.
pub struct Pool<T> {
    free: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T: Poolable> Pool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Check out an empty value; it returns to the pool when dropped.
    pub fn get(&self) -> Pooled<'_, T> {
        let value = self.free.lock().pop().unwrap_or_default();
        Pooled {
            pool: self,
            value: Some(value),
        }
    }

    fn put(&self, mut value: T) {
        value.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(value);
        }
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        self.free.lock().len()
    }
}

/// A value checked out of a [`Pool`].
pub struct Pooled<'p, T: Poolable> {
    pool: &'p Pool<T>,
    value: Option<T>,
}

impl<T: Poolable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("pooled value taken before drop"),
        }
    }
}

impl<T: Poolable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("pooled value taken before drop"),
        }
    }
}

impl<T: Poolable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.put(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_come_back_cleared() {
        let pool: Pool<Vec<u32>> = Pool::new(4);
        {
            let mut scratch = pool.get();
            scratch.extend([1, 2, 3]);
        }
        assert_eq!(pool.available(), 1);
        let scratch = pool.get();
        assert!(scratch.is_empty());
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_capacity_bounds_retained_values() {
        let pool: Pool<Vec<u32>> = Pool::new(1);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        assert_eq!(pool.available(), 1);
    }
}
