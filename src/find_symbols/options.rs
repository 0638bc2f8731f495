//! Search configuration.

use crate::base::SymbolId;
use crate::hir::Solution;

/// Options recognized by a reference search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FindReferencesSearchOptions {
    /// Report property reads against the getter and writes against the setter.
    pub associate_property_references_with_specific_accessor: bool,
    /// Expand the search through inheritance and linked declarations.
    pub cascade: bool,
    /// User-initiated search: run with full parallelism. Implicit searches
    /// are serialized on a single exclusive lane.
    pub explicit: bool,
    /// Never reverse direction once the hierarchy walk moved up or down.
    pub unidirectional_hierarchy_cascade: bool,
    /// Report definitions even when no reference to them was found.
    pub display_all_definitions: bool,
}

impl Default for FindReferencesSearchOptions {
    fn default() -> Self {
        Self {
            associate_property_references_with_specific_accessor: false,
            cascade: true,
            explicit: true,
            unidirectional_hierarchy_cascade: false,
            display_all_definitions: false,
        }
    }
}

impl FindReferencesSearchOptions {
    pub fn with_associate_property_references_with_specific_accessor(
        mut self,
        value: bool,
    ) -> Self {
        self.associate_property_references_with_specific_accessor = value;
        self
    }

    pub fn with_cascade(mut self, value: bool) -> Self {
        self.cascade = value;
        self
    }

    pub fn with_explicit(mut self, value: bool) -> Self {
        self.explicit = value;
        self
    }

    pub fn with_unidirectional_hierarchy_cascade(mut self, value: bool) -> Self {
        self.unidirectional_hierarchy_cascade = value;
        self
    }

    pub fn with_display_all_definitions(mut self, value: bool) -> Self {
        self.display_all_definitions = value;
        self
    }

    /// Adjust options for a search that starts at `symbol`.
    ///
    /// Starting from a property accessor means the caller cares about that
    /// accessor specifically, so accessor routing is turned on.
    pub fn for_starting_symbol(self, solution: &Solution, symbol: SymbolId) -> Self {
        match solution.try_symbol(symbol) {
            Some(data) if data.is_property_accessor() => {
                self.with_associate_property_references_with_specific_accessor(true)
            }
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = FindReferencesSearchOptions::default();
        assert!(options.cascade);
        assert!(options.explicit);
        assert!(!options.unidirectional_hierarchy_cascade);
        assert!(!options.associate_property_references_with_specific_accessor);
        assert!(!options.display_all_definitions);
    }

    #[test]
    fn test_builders_compose() {
        let options = FindReferencesSearchOptions::default()
            .with_cascade(false)
            .with_explicit(false);
        assert!(!options.cascade);
        assert!(!options.explicit);
    }
}
