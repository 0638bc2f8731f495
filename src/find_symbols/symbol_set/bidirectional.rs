use rustc_hash::FxHashSet;

use crate::base::{ProjectId, SymbolId};
use crate::error::{Result, check_cancelled};
use crate::find_symbols::equivalence::MetadataUnifyingSymbolSet;
use crate::find_symbols::pool::SYMBOL_STACKS;

use super::{SearchContext, cascade_closure, downward, upward};

/// A single pool walked both up and down the hierarchy in every project.
///
/// Searching `Derived.Run` finds `Base.Run` going up, and from there the
/// overrides in sibling classes going down.
#[derive(Clone, Debug, Default)]
pub struct BidirectionalSymbolSet {
    all: MetadataUnifyingSymbolSet,
}

impl BidirectionalSymbolSet {
    pub(super) fn new(initial: MetadataUnifyingSymbolSet, up: MetadataUnifyingSymbolSet) -> Self {
        let mut all = initial;
        all.union_with(&up);
        Self { all }
    }

    pub(super) fn inheritance_cascade(
        &mut self,
        ctx: &SearchContext<'_>,
        project: ProjectId,
    ) -> Result<()> {
        let scope: FxHashSet<ProjectId> = std::iter::once(project).collect();
        let none = MetadataUnifyingSymbolSet::new();
        let before = self.all.len();

        let mut stack = SYMBOL_STACKS.get();
        stack.extend(self.all.iter());
        while let Some(symbol) = stack.pop() {
            check_cancelled(ctx.cancel)?;
            let mut related = upward(ctx, symbol)?;
            related.extend(downward(ctx, symbol, &scope)?);
            for found in related {
                stack.extend(cascade_closure(ctx, found, &mut self.all, &none)?);
            }
        }

        tracing::debug!(%project, added = self.all.len() - before, "bidirectional cascade");
        Ok(())
    }

    pub fn all_symbols(&self) -> Vec<SymbolId> {
        self.all.to_vec()
    }
}
