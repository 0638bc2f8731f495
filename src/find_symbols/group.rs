//! Linked symbols and symbol groups.

use std::sync::Arc;

use crate::base::SymbolId;
use crate::hir::{Solution, SymbolKind};

/// One logical declaration as it appears in every compilation that
/// contains its document.
///
/// Groups are immutable. Two groups are equal when they hold the same
/// symbols.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SymbolGroup {
    symbols: Arc<[SymbolId]>,
}

impl SymbolGroup {
    /// The group `symbol` belongs to.
    ///
    /// # Panics
    /// Panics if the linked-symbol lookup loses `symbol` itself.
    pub fn for_symbol(solution: &Solution, symbol: SymbolId) -> Self {
        let mut symbols = linked_symbols(solution, symbol);
        if symbols.is_empty() {
            symbols.push(symbol);
        }
        symbols.sort_unstable();
        symbols.dedup();
        assert!(
            symbols.binary_search(&symbol).is_ok(),
            "symbol group for {symbol} does not contain it"
        );
        Self {
            symbols: symbols.into(),
        }
    }

    /// Members in ascending id order.
    pub fn symbols(&self) -> &[SymbolId] {
        &self.symbols
    }

    pub fn contains(&self, symbol: SymbolId) -> bool {
        self.symbols.binary_search(&symbol).is_ok()
    }

    /// The member declared in the lowest-numbered compilation.
    pub fn primary(&self) -> SymbolId {
        self.symbols[0]
    }
}

/// Every symbol declared at the same place as `symbol` in a linked
/// document, `symbol` included.
///
/// Metadata symbols and symbols without a declaration are only linked to
/// themselves.
pub fn linked_symbols(solution: &Solution, symbol: SymbolId) -> Vec<SymbolId> {
    let data = solution.symbol(symbol);

    // Accessors share their owner's location; link through the owner.
    if let Some(owner) = data.associated_symbol {
        let kind = data.method_kind;
        return linked_symbols(solution, owner)
            .into_iter()
            .filter_map(|linked| {
                solution
                    .symbol(linked)
                    .accessors
                    .iter()
                    .copied()
                    .find(|&a| solution.symbol(a).method_kind == kind)
            })
            .collect();
    }

    let mut linked = vec![symbol];
    if data.kind == SymbolKind::Namespace || data.original_definition.is_some() {
        return linked;
    }
    for location in data.source_locations() {
        for &document in solution.linked_documents(location.document) {
            if document == location.document {
                continue;
            }
            let Some(candidate) = solution.declared_symbol_at(document, location.range.start())
            else {
                continue;
            };
            let other = solution.symbol(candidate);
            if other.kind == data.kind && other.key == data.key && !linked.contains(&candidate) {
                linked.push(candidate);
            }
        }
    }
    linked
}
