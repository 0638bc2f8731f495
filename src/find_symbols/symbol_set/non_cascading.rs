use crate::base::SymbolId;
use crate::find_symbols::equivalence::MetadataUnifyingSymbolSet;

/// The starting symbols, searched as given.
#[derive(Clone, Debug, Default)]
pub struct NonCascadingSymbolSet {
    symbols: MetadataUnifyingSymbolSet,
}

impl NonCascadingSymbolSet {
    pub(super) fn new(symbols: MetadataUnifyingSymbolSet) -> Self {
        Self { symbols }
    }

    pub fn all_symbols(&self) -> Vec<SymbolId> {
        self.symbols.to_vec()
    }
}
