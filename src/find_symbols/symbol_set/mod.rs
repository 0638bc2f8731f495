//! The set of symbols a search looks for.
//!
//! A search starts from a few symbols, but references to overrides,
//! implementations and linked declarations must be found too. The set is
//! computed in two phases:
//!
//! 1. [`SymbolSet::create`] canonicalizes the starting symbols, closes them
//!    over finder cascades and linked symbols, and walks once up the
//!    inheritance hierarchy.
//! 2. [`SymbolSet::inheritance_cascade`] is called once per project, in
//!    topological order, and adds the implementations and overrides
//!    declared in that project.
//!
//! Which directions phase 2 may walk depends on the variant:
//!
//! ```text
//! NonCascading    starting symbols only, never grows
//! Unidirectional  up-set fixed after create; only the down-set grows
//! Bidirectional   one pool, walked up and down in every project
//! ```

mod bidirectional;
mod non_cascading;
mod unidirectional;

pub use bidirectional::BidirectionalSymbolSet;
pub use non_cascading::NonCascadingSymbolSet;
pub use unidirectional::UnidirectionalSymbolSet;

use rustc_hash::FxHashSet;
use tokio_util::sync::CancellationToken;

use crate::base::{ProjectId, SymbolId};
use crate::error::{FindError, Result, check_cancelled};
use crate::hir::{Solution, SymbolKind};

use super::SymbolFinder;
use super::equivalence::MetadataUnifyingSymbolSet;
use super::finders::{ReferenceFinder, canonical_symbol};
use super::group::linked_symbols;
use super::inheritance::{
    find_member_implementations, find_overrides, implemented_interface_members,
};
use super::options::FindReferencesSearchOptions;
use super::pool::SYMBOL_STACKS;

/// Everything one search needs to consult.
#[derive(Clone, Copy, Debug)]
pub struct SearchContext<'a> {
    pub finder: &'a SymbolFinder,
    pub solution: &'a Solution,
    pub options: FindReferencesSearchOptions,
    pub cancel: &'a CancellationToken,
}

#[derive(Clone, Debug)]
pub enum SymbolSet {
    NonCascading(NonCascadingSymbolSet),
    Unidirectional(UnidirectionalSymbolSet),
    Bidirectional(BidirectionalSymbolSet),
}

impl SymbolSet {
    /// Build the initial set for `symbols`.
    ///
    /// Fails with [`FindError::UnsupportedAliasTarget`] for an alias that
    /// does not name a type or namespace.
    #[tracing::instrument(level = "debug", skip_all, fields(symbols = symbols.len()))]
    pub fn create(ctx: &SearchContext<'_>, symbols: &[SymbolId]) -> Result<Self> {
        let solution = ctx.solution;
        let mut starting = MetadataUnifyingSymbolSet::new();
        for &symbol in symbols {
            check_cancelled(ctx.cancel)?;
            starting.insert(solution, appropriate_symbol(solution, symbol)?);
        }

        if !ctx.options.cascade {
            return Ok(SymbolSet::NonCascading(NonCascadingSymbolSet::new(starting)));
        }

        let mut initial = MetadataUnifyingSymbolSet::new();
        let none = MetadataUnifyingSymbolSet::new();
        for symbol in starting.iter() {
            cascade_closure(ctx, symbol, &mut initial, &none)?;
        }
        let up = initial_up_symbols(ctx, &initial)?;
        tracing::debug!(initial = initial.len(), up = up.len(), "symbol set created");

        Ok(if ctx.options.unidirectional_hierarchy_cascade {
            SymbolSet::Unidirectional(UnidirectionalSymbolSet::new(initial, up))
        } else {
            SymbolSet::Bidirectional(BidirectionalSymbolSet::new(initial, up))
        })
    }

    /// Grow the set with what `project` declares. Call once per project,
    /// in topological order, before searching the project.
    pub fn inheritance_cascade(
        &mut self,
        ctx: &SearchContext<'_>,
        project: ProjectId,
    ) -> Result<()> {
        match self {
            SymbolSet::NonCascading(_) => Ok(()),
            SymbolSet::Unidirectional(set) => set.inheritance_cascade(ctx, project),
            SymbolSet::Bidirectional(set) => set.inheritance_cascade(ctx, project),
        }
    }

    /// Every symbol currently in the set, in discovery order.
    pub fn all_symbols(&self) -> Vec<SymbolId> {
        match self {
            SymbolSet::NonCascading(set) => set.all_symbols(),
            SymbolSet::Unidirectional(set) => set.all_symbols(),
            SymbolSet::Bidirectional(set) => set.all_symbols(),
        }
    }
}

/// The symbol a search for `symbol` actually looks for: aliases resolve to
/// their target, constructed forms to their definition, and metadata to the
/// source declaration when the solution builds the assembly.
pub(crate) fn appropriate_symbol(solution: &Solution, symbol: SymbolId) -> Result<SymbolId> {
    let data = solution
        .try_symbol(symbol)
        .ok_or(FindError::UnknownSymbol(symbol))?;
    let symbol = if data.kind == SymbolKind::Alias {
        data.alias_target
            .filter(|&t| {
                matches!(
                    solution.symbol(t).kind,
                    SymbolKind::Type | SymbolKind::Namespace
                )
            })
            .ok_or(FindError::UnsupportedAliasTarget { alias: symbol })?
    } else {
        symbol
    };
    let symbol = canonical_symbol(solution, symbol);
    Ok(solution.find_source_definition(symbol).unwrap_or(symbol))
}

/// Add `seed` and everything reachable from it through finder cascades and
/// linked declarations to `set`, skipping symbols in `exclude`.
///
/// Returns the newly added symbols.
pub(crate) fn cascade_closure(
    ctx: &SearchContext<'_>,
    seed: SymbolId,
    set: &mut MetadataUnifyingSymbolSet,
    exclude: &MetadataUnifyingSymbolSet,
) -> Result<Vec<SymbolId>> {
    let solution = ctx.solution;
    let mut stack = SYMBOL_STACKS.get();
    stack.push(seed);
    let mut added = Vec::new();
    while let Some(symbol) = stack.pop() {
        check_cancelled(ctx.cancel)?;
        if exclude.contains(solution, symbol) || !set.insert(solution, symbol) {
            continue;
        }
        added.push(symbol);
        for finder in ReferenceFinder::ALL {
            stack.extend(finder.determine_cascaded_symbols(ctx, symbol));
        }
        stack.extend(linked_symbols(solution, symbol));
    }
    Ok(added)
}

/// Walk up from `initial` until nothing new is found.
fn initial_up_symbols(
    ctx: &SearchContext<'_>,
    initial: &MetadataUnifyingSymbolSet,
) -> Result<MetadataUnifyingSymbolSet> {
    let mut up = MetadataUnifyingSymbolSet::new();
    let mut stack = SYMBOL_STACKS.get();
    stack.extend(initial.iter());
    while let Some(symbol) = stack.pop() {
        check_cancelled(ctx.cancel)?;
        for related in upward(ctx, symbol)? {
            stack.extend(cascade_closure(ctx, related, &mut up, initial)?);
        }
    }
    Ok(up)
}

/// Interface members `symbol` implements, the member it overrides, and the
/// members it explicitly implements.
pub(crate) fn upward(ctx: &SearchContext<'_>, symbol: SymbolId) -> Result<Vec<SymbolId>> {
    let solution = ctx.solution;
    let data = solution.symbol(symbol);
    if !data.kind.participates_in_inheritance() {
        return Ok(Vec::new());
    }
    let mut related =
        implemented_interface_members(ctx.finder, solution, symbol, true, ctx.cancel)?;
    related.extend(data.overridden);
    related.extend(data.explicit_implementations.iter().copied());
    Ok(related
        .into_iter()
        .map(|s| solution.find_source_definition(s).unwrap_or(s))
        .collect())
}

/// Implementations and overrides of `symbol` declared in the single project
/// of `scope`.
///
/// # Panics
/// Panics unless `scope` holds exactly one project.
pub(crate) fn downward(
    ctx: &SearchContext<'_>,
    symbol: SymbolId,
    scope: &FxHashSet<ProjectId>,
) -> Result<Vec<SymbolId>> {
    assert!(
        scope.len() == 1,
        "downward cascade needs exactly one project, got {}",
        scope.len()
    );
    let solution = ctx.solution;
    if !solution.symbol(symbol).kind.participates_in_inheritance() {
        return Ok(Vec::new());
    }
    let mut related =
        find_member_implementations(ctx.finder, solution, symbol, Some(scope), ctx.cancel)?;
    related.extend(find_overrides(ctx.finder, solution, symbol, Some(scope), ctx.cancel)?);
    Ok(related)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{SolutionBuilder, TypeKind};

    struct Hierarchy {
        solution: Solution,
        p1: ProjectId,
        p2: ProjectId,
        interface_run: SymbolId,
        base_run: SymbolId,
        derived_run: SymbolId,
        sibling_run: SymbolId,
    }

    /// `IRunner.Run` in P1; `Base : IRunner` and `Derived : Base` in P1;
    /// `Sibling : IRunner` in P2.
    fn hierarchy() -> Hierarchy {
        let mut b = SolutionBuilder::new();
        let p1 = b.add_project("P1");
        let p2 = b.add_project("P2");
        b.add_project_reference(p2, p1);
        let d1 = b.add_document(
            p1,
            "Runners.cs",
            "interface IRunner { void Run(); } \
             class Base : IRunner { public virtual void Run() {} } \
             class Derived : Base { public override void Run() {} }",
        );
        let d2 = b.add_document(
            p2,
            "Sibling.cs",
            "class Sibling : IRunner { public void Run() {} }",
        );
        let irunner = b.declare_type(d1, "IRunner", TypeKind::Interface).id();
        let interface_run = b
            .declare_member(irunner, "Run", SymbolKind::Method)
            .signature("()")
            .id();
        let base = b.declare_type(d1, "Base", TypeKind::Class).implements(irunner).id();
        let base_run = b
            .declare_member(base, "Run", SymbolKind::Method)
            .occurrence(1)
            .signature("()")
            .is_virtual()
            .id();
        let derived = b.declare_type(d1, "Derived", TypeKind::Class).base_type(base).id();
        let derived_run = b
            .declare_member(derived, "Run", SymbolKind::Method)
            .occurrence(2)
            .signature("()")
            .overrides(base_run)
            .id();
        let sibling = b.declare_type(d2, "Sibling", TypeKind::Class).implements(irunner).id();
        let sibling_run = b
            .declare_member(sibling, "Run", SymbolKind::Method)
            .signature("()")
            .id();
        Hierarchy {
            solution: b.build().unwrap(),
            p1,
            p2,
            interface_run,
            base_run,
            derived_run,
            sibling_run,
        }
    }

    fn sorted(mut symbols: Vec<SymbolId>) -> Vec<SymbolId> {
        symbols.sort_unstable();
        symbols
    }

    #[test]
    fn test_non_cascading_keeps_starting_symbols() {
        let h = hierarchy();
        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let ctx = SearchContext {
            finder: &finder,
            solution: &h.solution,
            options: FindReferencesSearchOptions::default().with_cascade(false),
            cancel: &cancel,
        };
        let mut set = SymbolSet::create(&ctx, &[h.derived_run]).unwrap();
        set.inheritance_cascade(&ctx, h.p1).unwrap();
        assert_eq!(set.all_symbols(), vec![h.derived_run]);
    }

    #[test]
    fn test_bidirectional_reaches_siblings() {
        let h = hierarchy();
        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let ctx = SearchContext {
            finder: &finder,
            solution: &h.solution,
            options: FindReferencesSearchOptions::default(),
            cancel: &cancel,
        };
        let mut set = SymbolSet::create(&ctx, &[h.derived_run]).unwrap();
        assert_eq!(
            sorted(set.all_symbols()),
            sorted(vec![h.interface_run, h.base_run, h.derived_run])
        );
        set.inheritance_cascade(&ctx, h.p1).unwrap();
        set.inheritance_cascade(&ctx, h.p2).unwrap();
        assert!(set.all_symbols().contains(&h.sibling_run));
    }

    #[test]
    fn test_unidirectional_does_not_turn_back_down() {
        let h = hierarchy();
        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let ctx = SearchContext {
            finder: &finder,
            solution: &h.solution,
            options: FindReferencesSearchOptions::default()
                .with_unidirectional_hierarchy_cascade(true),
            cancel: &cancel,
        };
        let mut set = SymbolSet::create(&ctx, &[h.derived_run]).unwrap();
        set.inheritance_cascade(&ctx, h.p1).unwrap();
        set.inheritance_cascade(&ctx, h.p2).unwrap();
        let all = set.all_symbols();
        assert!(all.contains(&h.interface_run));
        assert!(!all.contains(&h.sibling_run));
    }

    #[test]
    fn test_alias_targets_are_restricted() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(
            p,
            "A.cs",
            "using W = Widget; using S = Widget.Size; class Widget { int Size; }",
        );
        let widget = b.declare_type(d, "Widget", TypeKind::Class).occurrence(2).id();
        let size = b.declare_member(widget, "Size", SymbolKind::Field).occurrence(1).id();
        let type_alias = b.declare_alias(d, "W", widget);
        let field_alias = b.declare_alias(d, "S", size);
        let solution = b.build().unwrap();

        assert_eq!(appropriate_symbol(&solution, type_alias).unwrap(), widget);
        assert_eq!(
            appropriate_symbol(&solution, field_alias).unwrap_err(),
            FindError::UnsupportedAliasTarget { alias: field_alias }
        );
    }

    #[test]
    #[should_panic(expected = "exactly one project")]
    fn test_downward_requires_a_single_project() {
        let h = hierarchy();
        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let ctx = SearchContext {
            finder: &finder,
            solution: &h.solution,
            options: FindReferencesSearchOptions::default(),
            cancel: &cancel,
        };
        let scope: FxHashSet<ProjectId> = [h.p1, h.p2].into_iter().collect();
        let _ = downward(&ctx, h.interface_run, &scope);
    }
}
