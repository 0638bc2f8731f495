//! Inheritance queries over solution symbols.
//!
//! These walk the relations recorded on [`SymbolData`](crate::hir::SymbolData)
//! and compare symbols through [`symbols_equivalent`], so that metadata
//! instances from different compilations line up.

use rustc_hash::FxHashSet;
use tokio_util::sync::CancellationToken;

use crate::base::{ProjectId, SymbolId};
use crate::error::Result;
use crate::hir::{Accessibility, Solution};

use super::SymbolFinder;
use super::dependent_types::{find_derived_classes, find_implementing_types};
use super::equivalence::{MetadataUnifyingSymbolSet, symbols_equivalent};

/// The base class chain of `ty`, nearest first, `ty` excluded.
pub fn base_types(solution: &Solution, ty: SymbolId) -> Vec<SymbolId> {
    let mut chain = Vec::new();
    let mut current = solution.symbol(ty).base_type;
    while let Some(base) = current {
        if base == ty || chain.contains(&base) {
            break;
        }
        chain.push(base);
        current = solution.symbol(base).base_type;
    }
    chain
}

/// Every interface `ty` implements, through its bases and through interface
/// inheritance.
pub fn all_interfaces(solution: &Solution, ty: SymbolId) -> Vec<SymbolId> {
    let mut seen = MetadataUnifyingSymbolSet::new();
    let mut stack: Vec<SymbolId> = std::iter::once(ty)
        .chain(base_types(solution, ty))
        .flat_map(|t| solution.symbol(t).interfaces.iter().rev().copied())
        .collect();
    stack.reverse();
    while let Some(interface) = stack.pop() {
        if seen.insert(solution, interface) {
            stack.extend(solution.symbol(interface).interfaces.iter().rev());
        }
    }
    seen.to_vec()
}

/// The member of `ty` (or one of its bases) that implements the interface
/// member `member`.
///
/// Explicit implementations win over implicit ones. Accessors are matched
/// through their property or event.
pub fn implementation_for_interface_member(
    solution: &Solution,
    ty: SymbolId,
    member: SymbolId,
) -> Option<SymbolId> {
    let data = solution.symbol(member);
    if let Some(owner) = data.associated_symbol {
        let implementation = implementation_for_interface_member(solution, ty, owner)?;
        return solution
            .symbol(implementation)
            .accessors
            .iter()
            .copied()
            .find(|&a| solution.symbol(a).method_kind == data.method_kind);
    }

    let hierarchy: Vec<SymbolId> = std::iter::once(ty).chain(base_types(solution, ty)).collect();

    let explicit = hierarchy.iter().find_map(|&t| {
        solution.symbol(t).members.iter().copied().find(|&m| {
            solution
                .symbol(m)
                .explicit_implementations
                .iter()
                .any(|&e| symbols_equivalent(solution, e, member))
        })
    });
    if explicit.is_some() {
        return explicit;
    }

    hierarchy.iter().find_map(|&t| {
        solution.symbol(t).members.iter().copied().find(|&m| {
            let candidate = solution.symbol(m);
            candidate.kind == data.kind
                && candidate.name == data.name
                && candidate.signature == data.signature
                && candidate.method_kind == data.method_kind
                && candidate.accessibility == Accessibility::Public
                && !candidate.is_static()
                && candidate.explicit_implementations.is_empty()
        })
    })
}

/// Interface members that `member` implements, implicitly or explicitly.
///
/// With `include_derived`, implementations that only arise in derived types
/// (`class B : A, I` where `A.M` implements `I.M`) are included too.
pub fn implemented_interface_members(
    finder: &SymbolFinder,
    solution: &Solution,
    member: SymbolId,
    include_derived: bool,
    cancel: &CancellationToken,
) -> Result<Vec<SymbolId>> {
    let data = solution.symbol(member);
    if !data.kind.participates_in_inheritance() || data.is_static() {
        return Ok(Vec::new());
    }
    let Some(container) = data.container else {
        return Ok(Vec::new());
    };
    if solution.symbol(container).is_interface() {
        return Ok(Vec::new());
    }

    let mut result = MetadataUnifyingSymbolSet::new();
    result.extend(solution, data.explicit_implementations.iter().copied());

    let mut types = vec![container];
    if include_derived && solution.symbol(container).is_class() {
        types.extend(find_derived_classes(finder, solution, container, None, true, cancel)?);
    }
    for ty in types {
        for interface in all_interfaces(solution, ty) {
            for &interface_member in &solution.symbol(interface).members {
                if solution.symbol(interface_member).kind != data.kind {
                    continue;
                }
                let implementation =
                    implementation_for_interface_member(solution, ty, interface_member);
                if implementation.is_some_and(|i| symbols_equivalent(solution, i, member)) {
                    result.insert(solution, interface_member);
                }
            }
        }
    }
    Ok(result.to_vec())
}

/// Members that override `member`, directly or through other overrides.
///
/// `scope` limits the answer to overrides declared in those projects.
pub fn find_overrides(
    finder: &SymbolFinder,
    solution: &Solution,
    member: SymbolId,
    scope: Option<&FxHashSet<ProjectId>>,
    cancel: &CancellationToken,
) -> Result<Vec<SymbolId>> {
    let data = solution.symbol(member);
    if !data.kind.participates_in_inheritance() || !data.is_overridable() {
        return Ok(Vec::new());
    }
    let Some(container) = data.container else {
        return Ok(Vec::new());
    };

    let mut result = MetadataUnifyingSymbolSet::new();
    for derived in find_derived_classes(finder, solution, container, scope, true, cancel)? {
        for &candidate in &solution.symbol(derived).members {
            if overrides(solution, candidate, member) && in_scope(solution, candidate, scope) {
                result.insert(solution, candidate);
            }
        }
    }
    Ok(result.to_vec())
}

/// Members implementing the interface member `member` in implementing types.
///
/// `scope` limits the answer to implementing types declared in those projects.
pub fn find_member_implementations(
    finder: &SymbolFinder,
    solution: &Solution,
    member: SymbolId,
    scope: Option<&FxHashSet<ProjectId>>,
    cancel: &CancellationToken,
) -> Result<Vec<SymbolId>> {
    let data = solution.symbol(member);
    if !data.kind.participates_in_inheritance() {
        return Ok(Vec::new());
    }
    let Some(container) = data.container else {
        return Ok(Vec::new());
    };
    if !solution.symbol(container).is_interface() {
        return Ok(Vec::new());
    }

    let mut result = MetadataUnifyingSymbolSet::new();
    for ty in find_implementing_types(finder, solution, container, scope, true, cancel)? {
        if !in_scope(solution, ty, scope) {
            continue;
        }
        if let Some(implementation) = implementation_for_interface_member(solution, ty, member) {
            result.insert(solution, implementation);
        }
    }
    Ok(result.to_vec())
}

/// Whether `candidate` overrides `member` somewhere along its override chain.
pub(crate) fn overrides(solution: &Solution, candidate: SymbolId, member: SymbolId) -> bool {
    let mut current = solution.symbol(candidate).overridden;
    let mut steps = 0;
    while let Some(overridden) = current {
        if symbols_equivalent(solution, overridden, member) {
            return true;
        }
        steps += 1;
        if steps > solution.symbol_count() {
            break;
        }
        current = solution.symbol(overridden).overridden;
    }
    false
}

fn in_scope(solution: &Solution, symbol: SymbolId, scope: Option<&FxHashSet<ProjectId>>) -> bool {
    scope.is_none_or(|s| s.contains(&solution.symbol(symbol).compilation()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{SolutionBuilder, SymbolKind, TypeKind};

    #[test]
    fn test_implicit_and_explicit_implementations() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(
            p,
            "Shapes.cs",
            "interface IShape { void Draw(); int Area { get; } } \
             class Square : IShape { public void Draw() {} int IShape.Area { get; } }",
        );
        let ishape = b.declare_type(d, "IShape", TypeKind::Interface).id();
        let draw = b.declare_member(ishape, "Draw", SymbolKind::Method).signature("()").id();
        let area = b.declare_member(ishape, "Area", SymbolKind::Property).id();
        let square = b.declare_type(d, "Square", TypeKind::Class).implements(ishape).id();
        let square_draw = b
            .declare_member(square, "Draw", SymbolKind::Method)
            .occurrence(1)
            .signature("()")
            .id();
        let square_area = b
            .declare_member(square, "Area", SymbolKind::Property)
            .occurrence(1)
            .accessibility(Accessibility::Private)
            .explicitly_implements(area)
            .id();
        let solution = b.build().unwrap();

        assert_eq!(implementation_for_interface_member(&solution, square, draw), Some(square_draw));
        assert_eq!(implementation_for_interface_member(&solution, square, area), Some(square_area));

        let getter = solution.symbol(area).accessors[0];
        let square_getter = solution.symbol(square_area).accessors[0];
        assert_eq!(
            implementation_for_interface_member(&solution, square, getter),
            Some(square_getter)
        );

        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let implemented =
            implemented_interface_members(&finder, &solution, square_draw, false, &cancel).unwrap();
        assert_eq!(implemented, vec![draw]);
    }

    #[test]
    fn test_all_interfaces_follows_bases_and_interface_inheritance() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(
            p,
            "A.cs",
            "interface IBase {} interface IDerived : IBase {} class A : IDerived {} class B : A {}",
        );
        let ibase = b.declare_type(d, "IBase", TypeKind::Interface).id();
        let iderived = b
            .declare_type(d, "IDerived", TypeKind::Interface)
            .implements(ibase)
            .id();
        let a = b.declare_type(d, "A", TypeKind::Class).implements(iderived).id();
        let bt = b.declare_type(d, "B", TypeKind::Class).base_type(a).id();
        let solution = b.build().unwrap();

        assert_eq!(base_types(&solution, bt), vec![a]);
        assert_eq!(all_interfaces(&solution, bt), vec![iderived, ibase]);
    }

    #[test]
    fn test_override_chains() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(
            p,
            "A.cs",
            "class A { virtual void Run() {} } class B : A { override void Run() {} } \
             class C : B { override void Run() {} }",
        );
        let a = b.declare_type(d, "A", TypeKind::Class).id();
        let a_run = b.declare_member(a, "Run", SymbolKind::Method).is_virtual().id();
        let bt = b.declare_type(d, "B", TypeKind::Class).base_type(a).id();
        let b_run = b
            .declare_member(bt, "Run", SymbolKind::Method)
            .occurrence(1)
            .overrides(a_run)
            .id();
        let c = b.declare_type(d, "C", TypeKind::Class).base_type(bt).id();
        let c_run = b
            .declare_member(c, "Run", SymbolKind::Method)
            .occurrence(2)
            .overrides(b_run)
            .id();
        let solution = b.build().unwrap();

        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let mut found = find_overrides(&finder, &solution, a_run, None, &cancel).unwrap();
        found.sort_unstable();
        assert_eq!(found, vec![b_run, c_run]);
        assert!(overrides(&solution, c_run, a_run));
    }
}
