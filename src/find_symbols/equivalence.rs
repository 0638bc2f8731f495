//! Symbol equivalence across compilations.
//!
//! Every compilation that references a metadata assembly gets its own
//! instances of that assembly's symbols. For search purposes those instances
//! denote the same logical symbol and must be merged. Source symbols are
//! never merged: two source declarations are only equal when they are the
//! same declaration.
//!
//! Every set or map keyed by symbol in the engine goes through
//! [`SymbolIdentity`].

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::base::SymbolId;
use crate::hir::Solution;

/// The equivalence class of a symbol.
///
/// Equality and hashing of this type define symbol equivalence.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolIdentity {
    /// A symbol with at least one source location: compared by identity.
    Source(SymbolId),
    /// A pure metadata symbol: compared by defining assembly and key.
    Metadata { assembly: SmolStr, key: SmolStr },
}

impl SymbolIdentity {
    pub fn of(solution: &Solution, symbol: SymbolId) -> Self {
        let data = solution.symbol(symbol);
        if data.is_source() {
            return SymbolIdentity::Source(symbol);
        }
        SymbolIdentity::Metadata {
            // Assembly names compare case-insensitively.
            assembly: data
                .containing_assembly
                .as_deref()
                .map(|name| SmolStr::new(name.to_ascii_lowercase()))
                .unwrap_or_default(),
            key: data.key.clone(),
        }
    }
}

/// Whether `a` and `b` denote the same symbol for search purposes.
pub fn symbols_equivalent(solution: &Solution, a: SymbolId, b: SymbolId) -> bool {
    a == b || SymbolIdentity::of(solution, a) == SymbolIdentity::of(solution, b)
}

/// An insertion-ordered symbol set keyed by [`SymbolIdentity`].
///
/// The first instance inserted for an identity is the one kept.
#[derive(Clone, Debug, Default)]
pub struct MetadataUnifyingSymbolSet {
    symbols: IndexMap<SymbolIdentity, SymbolId>,
}

impl MetadataUnifyingSymbolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no equivalent symbol was present.
    pub fn insert(&mut self, solution: &Solution, symbol: SymbolId) -> bool {
        let identity = SymbolIdentity::of(solution, symbol);
        if self.symbols.contains_key(&identity) {
            return false;
        }
        self.symbols.insert(identity, symbol);
        true
    }

    pub fn contains(&self, solution: &Solution, symbol: SymbolId) -> bool {
        self.symbols.contains_key(&SymbolIdentity::of(solution, symbol))
    }

    /// The kept instance equivalent to `symbol`, if any.
    pub fn get(&self, solution: &Solution, symbol: SymbolId) -> Option<SymbolId> {
        self.symbols
            .get(&SymbolIdentity::of(solution, symbol))
            .copied()
    }

    pub fn extend(&mut self, solution: &Solution, symbols: impl IntoIterator<Item = SymbolId>) {
        for symbol in symbols {
            self.insert(solution, symbol);
        }
    }

    /// Add every symbol of `other` whose identity is not present yet.
    pub fn union_with(&mut self, other: &MetadataUnifyingSymbolSet) {
        for (identity, &symbol) in &other.symbols {
            self.symbols.entry(identity.clone()).or_insert(symbol);
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.symbols.values().copied()
    }

    pub fn to_vec(&self) -> Vec<SymbolId> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{SolutionBuilder, TypeKind};

    fn two_instances() -> (Solution, SymbolId, SymbolId) {
        let mut b = SolutionBuilder::new();
        b.declare_metadata_type("System.Runtime", "System.IDisposable", TypeKind::Interface);
        let p1 = b.add_project("P1");
        let p2 = b.add_project("P2");
        b.add_metadata_reference(p1, "System.Runtime");
        b.add_metadata_reference(p2, "System.Runtime");
        let solution = b.build().unwrap();
        let a = solution.resolve_key(p1, "T:System.IDisposable").unwrap();
        let c = solution.resolve_key(p2, "T:System.IDisposable").unwrap();
        (solution, a, c)
    }

    #[test]
    fn test_metadata_instances_are_equivalent() {
        let (solution, a, c) = two_instances();
        assert_ne!(a, c);
        assert!(symbols_equivalent(&solution, a, c));
        assert_eq!(SymbolIdentity::of(&solution, a), SymbolIdentity::of(&solution, c));
    }

    #[test]
    fn test_set_keeps_first_instance() {
        let (solution, a, c) = two_instances();
        let mut set = MetadataUnifyingSymbolSet::new();
        assert!(set.insert(&solution, a));
        assert!(!set.insert(&solution, c));
        assert!(set.contains(&solution, c));
        assert_eq!(set.get(&solution, c), Some(a));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_source_symbols_with_equal_keys_stay_distinct() {
        let mut b = SolutionBuilder::new();
        let p1 = b.add_project("P1");
        let p2 = b.add_project("P2");
        let d1 = b.add_document(p1, "A.cs", "class Widget {}");
        let d2 = b.add_document(p2, "B.cs", "class Widget {}");
        let w1 = b.declare_type(d1, "Widget", TypeKind::Class).id();
        let w2 = b.declare_type(d2, "Widget", TypeKind::Class).id();
        let solution = b.build().unwrap();

        assert_eq!(solution.symbol(w1).key, solution.symbol(w2).key);
        assert!(!symbols_equivalent(&solution, w1, w2));
        assert!(symbols_equivalent(&solution, w1, w1));
    }
}
