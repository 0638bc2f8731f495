use rustc_hash::FxHashSet;

use crate::base::{ProjectId, SymbolId};
use crate::error::{Result, check_cancelled};
use crate::find_symbols::equivalence::MetadataUnifyingSymbolSet;
use crate::find_symbols::pool::SYMBOL_STACKS;

use super::{SearchContext, cascade_closure, downward};

/// Separate up and down pools; a walk never reverses direction.
///
/// The up pool is computed once by [`SymbolSet::create`](super::SymbolSet::create)
/// and never changes afterwards. Each project only adds implementations and
/// overrides of the down pool.
#[derive(Clone, Debug, Default)]
pub struct UnidirectionalSymbolSet {
    down: MetadataUnifyingSymbolSet,
    up: MetadataUnifyingSymbolSet,
}

impl UnidirectionalSymbolSet {
    pub(super) fn new(initial: MetadataUnifyingSymbolSet, up: MetadataUnifyingSymbolSet) -> Self {
        Self { down: initial, up }
    }

    pub(super) fn inheritance_cascade(
        &mut self,
        ctx: &SearchContext<'_>,
        project: ProjectId,
    ) -> Result<()> {
        let scope: FxHashSet<ProjectId> = std::iter::once(project).collect();
        let before = self.down.len();

        let mut stack = SYMBOL_STACKS.get();
        stack.extend(self.down.iter());
        while let Some(symbol) = stack.pop() {
            check_cancelled(ctx.cancel)?;
            for found in downward(ctx, symbol, &scope)? {
                stack.extend(cascade_closure(ctx, found, &mut self.down, &self.up)?);
            }
        }

        tracing::debug!(%project, added = self.down.len() - before, "unidirectional cascade");
        Ok(())
    }

    /// The symbols found walking up from the starting symbols.
    pub fn up_symbols(&self) -> Vec<SymbolId> {
        self.up.to_vec()
    }

    pub fn down_symbols(&self) -> Vec<SymbolId> {
        self.down.to_vec()
    }

    pub fn all_symbols(&self) -> Vec<SymbolId> {
        let mut all = self.down.clone();
        all.union_with(&self.up);
        all.to_vec()
    }
}
