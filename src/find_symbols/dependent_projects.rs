//! Which projects could reference a symbol.
//!
//! A project can only reference a symbol if it can see the assembly the
//! symbol is defined in, and, for non-public symbols, if the defining
//! assembly grants it access.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::base::{ProjectId, SymbolId};
use crate::hir::{Accessibility, AssemblyInfo, Solution, SymbolKind, SymbolOrigin};

use super::cache::SnapshotCache;

/// A project that can see a defining assembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependentProject {
    pub project: ProjectId,
    /// The defining assembly's `InternalsVisibleTo` covers this project.
    pub has_internals_access: bool,
}

/// Effective visibility of a symbol from outside its assembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Visibility {
    Private,
    Internal,
    Public,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct DefinitionKey {
    /// Lowercased assembly name.
    assembly: SmolStr,
    /// Source project building the assembly, if any.
    project: Option<ProjectId>,
}

/// Dependent projects per defining assembly, per solution snapshot.
#[derive(Default)]
pub struct DependentProjectsCache {
    entries: SnapshotCache<DefinitionKey, Arc<[DependentProject]>>,
}

/// Projects that could contain references to `symbol`, ordered topologically.
///
/// `scope` restricts the answer; `None` means the whole solution. A symbol
/// whose defining assembly is unknown has no dependent projects.
pub fn dependent_projects(
    solution: &Solution,
    symbol: SymbolId,
    scope: Option<&FxHashSet<ProjectId>>,
    cache: &DependentProjectsCache,
) -> Vec<ProjectId> {
    let data = solution.symbol(symbol);
    let in_scope = |p: &ProjectId| scope.is_none_or(|s| s.contains(p));

    if data.kind == SymbolKind::Namespace {
        return in_topological_order(solution, solution.project_ids().filter(in_scope));
    }

    let Some(assembly) = data.containing_assembly.clone() else {
        return Vec::new();
    };
    let origin = match data.origin {
        SymbolOrigin::Source { project, .. } => Some(project),
        SymbolOrigin::Metadata { .. } => solution.project_for_assembly(&assembly),
    };

    let visibility = resultant_visibility(solution, symbol);
    if visibility == Visibility::Private {
        // Only later submissions can see private members; not cached.
        let Some(origin) = origin else {
            return Vec::new();
        };
        let projects = std::iter::once(origin)
            .chain(following_submissions(solution, origin))
            .filter(in_scope);
        return in_topological_order(solution, projects);
    }

    let key = DefinitionKey {
        assembly: SmolStr::new(assembly.to_ascii_lowercase()),
        project: origin,
    };
    let dependents = cache.entries.get_or_insert_with(solution, key, || {
        compute_dependents(solution, &assembly, origin).into()
    });
    tracing::trace!(%symbol, ?visibility, dependents = dependents.len(), "dependent projects");

    let projects = dependents
        .iter()
        .filter(|d| visibility == Visibility::Public || d.has_internals_access)
        .map(|d| d.project)
        .filter(in_scope);
    in_topological_order(solution, projects)
}

fn compute_dependents(
    solution: &Solution,
    assembly: &str,
    origin: Option<ProjectId>,
) -> Vec<DependentProject> {
    let info = solution.assembly(assembly);
    let access = |project: ProjectId| {
        let name = solution
            .project(project)
            .map(|p| p.assembly_name.as_str())
            .unwrap_or_default();
        info.is_some_and(|info| grants_internals_access(info, name))
    };

    let mut result = Vec::new();
    match origin {
        Some(origin) => {
            result.push(DependentProject {
                project: origin,
                has_internals_access: true,
            });
            let mut dependents: Vec<ProjectId> = solution
                .dependency_graph()
                .transitively_dependent_projects(origin)
                .into_iter()
                .collect();
            // Projects can also see the origin's output as a metadata reference.
            for project in solution.project_ids() {
                let by_metadata = solution
                    .visible_metadata_assemblies(project)
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(assembly));
                if by_metadata && project != origin && !dependents.contains(&project) {
                    dependents.push(project);
                }
            }
            dependents.sort_unstable();
            result.extend(dependents.into_iter().map(|project| DependentProject {
                project,
                has_internals_access: access(project),
            }));
        }
        None => {
            for project in solution.project_ids() {
                if solution.references_assembly(project, assembly) {
                    result.push(DependentProject {
                        project,
                        has_internals_access: access(project),
                    });
                }
            }
        }
    }
    result
}

/// Whether `info`'s `InternalsVisibleTo` arguments name `assembly_name`.
///
/// Arguments may carry a strong-name or culture suffix after the first comma.
pub(crate) fn grants_internals_access(info: &AssemblyInfo, assembly_name: &str) -> bool {
    info.internals_visible_to.iter().any(|arg| {
        let name = arg.split(',').next().unwrap_or_default().trim();
        name.eq_ignore_ascii_case(assembly_name)
    })
}

/// The most restrictive accessibility along the symbol's container chain.
pub(crate) fn resultant_visibility(solution: &Solution, symbol: SymbolId) -> Visibility {
    let mut visibility = Visibility::Public;
    let mut current = Some(symbol);
    while let Some(id) = current {
        let data = solution.symbol(id);
        if data.kind == SymbolKind::Namespace {
            break;
        }
        let own = match data.kind {
            SymbolKind::Local => Visibility::Private,
            _ => match data.accessibility {
                Accessibility::Private => Visibility::Private,
                Accessibility::Internal | Accessibility::ProtectedAndInternal => {
                    Visibility::Internal
                }
                Accessibility::Public
                | Accessibility::Protected
                | Accessibility::ProtectedOrInternal => Visibility::Public,
            },
        };
        visibility = visibility.min(own);
        current = data.container;
    }
    visibility
}

/// Submissions that continue `origin`, directly or through other submissions.
fn following_submissions(solution: &Solution, origin: ProjectId) -> Vec<ProjectId> {
    let mut chain = vec![origin];
    let mut result = Vec::new();
    while let Some(previous) = chain.pop() {
        for project in solution.projects() {
            if project.is_submission && project.previous_submission == Some(previous) {
                result.push(project.id);
                chain.push(project.id);
            }
        }
    }
    result
}

fn in_topological_order(
    solution: &Solution,
    projects: impl IntoIterator<Item = ProjectId>,
) -> Vec<ProjectId> {
    let wanted: FxHashSet<ProjectId> = projects.into_iter().collect();
    solution
        .dependency_graph()
        .topologically_sorted()
        .iter()
        .copied()
        .filter(|p| wanted.contains(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{SolutionBuilder, SymbolKind, TypeKind};

    #[test]
    fn test_internals_visible_to_strips_strong_name() {
        let info = AssemblyInfo {
            name: "Core".into(),
            internals_visible_to: vec!["Core.Tests, PublicKey=0024000004".into()],
        };
        assert!(grants_internals_access(&info, "core.tests"));
        assert!(!grants_internals_access(&info, "Core"));
    }

    #[test]
    fn test_private_members_reach_following_submissions() {
        let mut b = SolutionBuilder::new();
        let s1 = b.add_submission("Submission#1", None);
        let s2 = b.add_submission("Submission#2", Some(s1));
        let s3 = b.add_submission("Submission#3", Some(s2));
        let other = b.add_project("Other");
        b.add_project_reference(other, s1);
        let d = b.add_document(s1, "s1.csx", "class Script { int counter; }");
        let script = b.declare_type(d, "Script", TypeKind::Class).id();
        let counter = b
            .declare_member(script, "counter", SymbolKind::Field)
            .accessibility(Accessibility::Private)
            .id();
        let solution = b.build().unwrap();

        let cache = DependentProjectsCache::default();
        assert_eq!(dependent_projects(&solution, counter, None, &cache), vec![s1, s2, s3]);
        assert_eq!(
            dependent_projects(&solution, script, None, &cache),
            vec![s1, s2, s3, other]
        );
    }

    #[test]
    fn test_namespaces_are_visible_everywhere() {
        let mut b = SolutionBuilder::new();
        let p1 = b.add_project("P1");
        let p2 = b.add_project("P2");
        let d = b.add_document(p1, "A.cs", "namespace Shop {}");
        let ns = b.declare_namespace(d, "Shop");
        let solution = b.build().unwrap();

        let cache = DependentProjectsCache::default();
        assert_eq!(dependent_projects(&solution, ns, None, &cache), vec![p1, p2]);
        let scope: FxHashSet<ProjectId> = [p2].into_iter().collect();
        assert_eq!(dependent_projects(&solution, ns, Some(&scope), &cache), vec![p2]);
    }

    #[test]
    fn test_metadata_symbols_depend_on_referencing_projects() {
        let mut b = SolutionBuilder::new();
        b.declare_metadata_type("Lib", "Lib.Shape", TypeKind::Class);
        let p1 = b.add_project("P1");
        let p2 = b.add_project("P2");
        b.add_project("P3");
        b.add_metadata_reference(p1, "Lib");
        b.add_project_reference(p2, p1);
        let solution = b.build().unwrap();

        let shape = solution.resolve_key(p2, "T:Lib.Shape").unwrap();
        let cache = DependentProjectsCache::default();
        assert_eq!(dependent_projects(&solution, shape, None, &cache), vec![p1, p2]);
    }

    #[test]
    fn test_source_symbols_reach_metadata_consumers() {
        let mut b = SolutionBuilder::new();
        let core = b.add_project("Core");
        b.set_assembly_name(core, "Lib");
        let p1 = b.add_project("P1");
        let p2 = b.add_project("P2");
        b.add_project("P3");
        b.declare_metadata_type("LIB", "Lib.Shape", TypeKind::Class);
        b.add_metadata_reference(p1, "LIB");
        b.add_project_reference(p2, p1);
        let d = b.add_document(core, "Shape.cs", "class Shape {}");
        let shape = b.declare_type(d, "Shape", TypeKind::Class).id();
        let solution = b.build().unwrap();

        let cache = DependentProjectsCache::default();
        let mut found = dependent_projects(&solution, shape, None, &cache);
        found.sort_unstable();
        assert_eq!(found, vec![core, p1, p2]);
    }
}
