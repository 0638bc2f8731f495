//! Derived classes, derived interfaces and implementing types.
//!
//! All three searches share one sweep: restrict the solution to the
//! projects that could see the starting type, visit them in dependency
//! order, and in each project look for types whose inheritance clause
//! names a type already found. Types found in one project become the
//! frontier for later projects.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

use crate::base::{ProjectId, SymbolId};
use crate::error::{Result, check_cancelled};
use crate::hir::{Solution, SymbolKind, SymbolOrigin};
use crate::syntax::fold_case;

use super::SymbolFinder;
use super::cache::SnapshotCache;
use super::dependent_projects::dependent_projects;
use super::equivalence::{MetadataUnifyingSymbolSet, SymbolIdentity};
use super::project_index::ProjectIndex;
use super::remote::{DependentTypesRequest, SerializedSymbol};

/// Which relation a dependent-type search follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DependentTypeKind {
    DerivedClasses,
    DerivedInterfaces,
    ImplementingTypes,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct DependentTypesKey {
    kind: DependentTypeKind,
    identity: SymbolIdentity,
    transitive: bool,
    /// Sorted, so equal scopes hash alike regardless of construction order.
    scope: Option<Vec<ProjectId>>,
}

/// Results of dependent-type searches per solution snapshot.
#[derive(Default)]
pub struct DependentTypesCache {
    entries: SnapshotCache<DependentTypesKey, Arc<[SymbolId]>>,
}

/// Simple name of a base type or interface -> keys of metadata types
/// listing it, for one assembly.
#[derive(Debug, Default)]
struct MetadataNameIndex {
    by_base_name: FxHashMap<SmolStr, Vec<SmolStr>>,
}

/// Metadata name indexes per (lowercased) assembly name.
#[derive(Default)]
pub struct MetadataNameIndexCache {
    entries: SnapshotCache<SmolStr, Arc<MetadataNameIndex>>,
}

/// Classes deriving from `ty`; immediate subclasses only unless `transitive`.
///
/// Sealed types and non-classes have no derived classes.
pub fn find_derived_classes(
    finder: &SymbolFinder,
    solution: &Solution,
    ty: SymbolId,
    scope: Option<&FxHashSet<ProjectId>>,
    transitive: bool,
    cancel: &CancellationToken,
) -> Result<Vec<SymbolId>> {
    let kind = DependentTypeKind::DerivedClasses;
    find_dependent_types(finder, solution, ty, scope, transitive, kind, cancel)
}

/// Interfaces inheriting from the interface `ty`.
pub fn find_derived_interfaces(
    finder: &SymbolFinder,
    solution: &Solution,
    ty: SymbolId,
    scope: Option<&FxHashSet<ProjectId>>,
    transitive: bool,
    cancel: &CancellationToken,
) -> Result<Vec<SymbolId>> {
    let kind = DependentTypeKind::DerivedInterfaces;
    find_dependent_types(finder, solution, ty, scope, transitive, kind, cancel)
}

/// Classes and structs implementing the interface `ty`.
///
/// When `transitive`, implementations of derived interfaces and subclasses
/// of implementing classes are included.
pub fn find_implementing_types(
    finder: &SymbolFinder,
    solution: &Solution,
    ty: SymbolId,
    scope: Option<&FxHashSet<ProjectId>>,
    transitive: bool,
    cancel: &CancellationToken,
) -> Result<Vec<SymbolId>> {
    let kind = DependentTypeKind::ImplementingTypes;
    find_dependent_types(finder, solution, ty, scope, transitive, kind, cancel)
}

#[tracing::instrument(level = "debug", skip_all, fields(?kind, %ty, transitive))]
fn find_dependent_types(
    finder: &SymbolFinder,
    solution: &Solution,
    ty: SymbolId,
    scope: Option<&FxHashSet<ProjectId>>,
    transitive: bool,
    kind: DependentTypeKind,
    cancel: &CancellationToken,
) -> Result<Vec<SymbolId>> {
    check_cancelled(cancel)?;
    let data = solution.symbol(ty);
    let eligible = match kind {
        DependentTypeKind::DerivedClasses => data.is_class() && !data.is_sealed(),
        DependentTypeKind::DerivedInterfaces | DependentTypeKind::ImplementingTypes => {
            data.is_interface()
        }
    };
    if !eligible {
        return Ok(Vec::new());
    }

    let scope_key = scope.map(|s| {
        let mut projects: Vec<ProjectId> = s.iter().copied().collect();
        projects.sort_unstable();
        projects
    });
    let key = DependentTypesKey {
        kind,
        identity: SymbolIdentity::of(solution, ty),
        transitive,
        scope: scope_key.clone(),
    };
    let types = finder.dependent_types.entries.get_or_try_insert_with(solution, key, || {
        let request = DependentTypesRequest {
            kind,
            project: data.compilation(),
            type_key: data.key.clone(),
            transitive,
            scope: scope_key,
        };
        compute(finder, solution, ty, scope, &request, cancel).map(Arc::from)
    })?;
    Ok(types.to_vec())
}

fn compute(
    finder: &SymbolFinder,
    solution: &Solution,
    ty: SymbolId,
    scope: Option<&FxHashSet<ProjectId>>,
    request: &DependentTypesRequest,
    cancel: &CancellationToken,
) -> Result<Vec<SymbolId>> {
    if let Some(remote) = &finder.remote {
        match remote.find_dependent_types(solution, request) {
            Ok(Some(answer)) => return Ok(rehydrate(solution, &answer)),
            Ok(None) => {}
            // TODO: report remote failures to the caller once hosts are
            // reliable enough that a local re-run is the exception.
            Err(err) => {
                tracing::warn!(%err, "remote dependent type search failed, searching in process")
            }
        }
    }
    find_locally(finder, solution, ty, scope, request.kind, request.transitive, cancel)
}

fn rehydrate(solution: &Solution, answer: &[SerializedSymbol]) -> Vec<SymbolId> {
    answer
        .iter()
        .filter_map(|s| {
            let symbol = solution.resolve_key(s.project, &s.key);
            if symbol.is_none() {
                tracing::trace!(
                    key = %s.key,
                    project = %s.project,
                    "remote answer not in snapshot"
                );
            }
            symbol
        })
        .collect()
}

/// Running state of one sweep.
struct Sweep<'s> {
    solution: &'s Solution,
    kind: DependentTypeKind,
    transitive: bool,
    /// Types whose dependents are being looked for.
    frontier: MetadataUnifyingSymbolSet,
    found: MetadataUnifyingSymbolSet,
}

impl Sweep<'_> {
    /// Record `candidate` if it relates to the frontier. Returns whether
    /// anything changed.
    fn consider(&mut self, candidate: SymbolId, implicit_base: bool) -> bool {
        let solution = self.solution;
        if self.found.contains(solution, candidate) || self.frontier.contains(solution, candidate) {
            return false;
        }
        let data = solution.symbol(candidate);
        if data.kind != SymbolKind::Type {
            return false;
        }
        let base_matches = implicit_base
            || data
                .base_type
                .is_some_and(|base| self.frontier.contains(solution, base));
        let interface_matches = data
            .interfaces
            .iter()
            .any(|&i| self.frontier.contains(solution, i));

        let (is_result, keep_searching) = match self.kind {
            DependentTypeKind::DerivedClasses => {
                (base_matches, data.is_class() && !data.is_sealed())
            }
            DependentTypeKind::DerivedInterfaces => {
                (data.is_interface() && interface_matches, true)
            }
            DependentTypeKind::ImplementingTypes if data.is_interface() => {
                (false, interface_matches)
            }
            DependentTypeKind::ImplementingTypes => (
                interface_matches || (data.is_class() && base_matches),
                data.is_class() && !data.is_sealed(),
            ),
        };

        let mut changed = false;
        if is_result {
            self.found.insert(solution, candidate);
            changed = true;
        }
        let related = is_result || interface_matches;
        if self.transitive && keep_searching && related {
            changed |= self.frontier.insert(solution, candidate);
        }
        changed
    }

    fn frontier_names(&self, case_sensitive: bool) -> FxHashSet<SmolStr> {
        self.frontier
            .iter()
            .map(|t| fold_case(&self.solution.symbol(t).name, case_sensitive))
            .collect()
    }

    fn frontier_has_metadata(&self) -> bool {
        self.frontier
            .iter()
            .any(|t| matches!(self.solution.symbol(t).origin, SymbolOrigin::Metadata { .. }))
    }
}

fn find_locally(
    finder: &SymbolFinder,
    solution: &Solution,
    ty: SymbolId,
    scope: Option<&FxHashSet<ProjectId>>,
    kind: DependentTypeKind,
    transitive: bool,
    cancel: &CancellationToken,
) -> Result<Vec<SymbolId>> {
    let projects = projects_to_search(finder, solution, ty, scope);
    tracing::trace!(projects = projects.len(), "sweeping projects");

    let mut sweep = Sweep {
        solution,
        kind,
        transitive,
        frontier: MetadataUnifyingSymbolSet::new(),
        found: MetadataUnifyingSymbolSet::new(),
    };
    sweep.frontier.insert(solution, ty);

    for project in projects {
        check_cancelled(cancel)?;
        // Types found in this project may have dependents in the same project.
        loop {
            let mut changed = false;
            if sweep.frontier_has_metadata() {
                changed |= add_metadata_matches(finder, &mut sweep, project);
            }
            changed |= add_source_matches(finder, &mut sweep, project);
            if !changed {
                break;
            }
        }
    }
    Ok(sweep.found.to_vec())
}

/// Projects that could contain dependents of `ty`, restricted to `scope`
/// and everything `scope` depends on, in dependency order.
fn projects_to_search(
    finder: &SymbolFinder,
    solution: &Solution,
    ty: SymbolId,
    scope: Option<&FxHashSet<ProjectId>>,
) -> Vec<ProjectId> {
    let candidates = dependent_projects(solution, ty, None, &finder.dependent_projects);
    let Some(scope) = scope else {
        return candidates;
    };
    let graph = solution.dependency_graph();
    let mut reachable: FxHashSet<ProjectId> = scope.clone();
    for &project in scope {
        reachable.extend(graph.transitive_dependencies(project));
    }
    candidates.into_iter().filter(|p| reachable.contains(p)).collect()
}

fn add_metadata_matches(finder: &SymbolFinder, sweep: &mut Sweep<'_>, project: ProjectId) -> bool {
    let solution = sweep.solution;
    let names = sweep.frontier_names(true);
    let mut changed = false;
    for assembly in solution.visible_metadata_assemblies(project) {
        let index = metadata_name_index(finder, solution, assembly);
        for name in &names {
            for key in index.by_base_name.get(name).into_iter().flatten() {
                if let Some(candidate) = solution.resolve_key(project, key) {
                    changed |= sweep.consider(candidate, false);
                }
            }
        }
    }
    changed
}

fn add_source_matches(finder: &SymbolFinder, sweep: &mut Sweep<'_>, project: ProjectId) -> bool {
    let solution = sweep.solution;
    let case_sensitive = solution
        .project(project)
        .is_some_and(|p| p.language.is_case_sensitive());
    let index = ProjectIndex::get(solution, project, &finder.project_indexes);
    let mut changed = false;

    for name in sweep.frontier_names(case_sensitive) {
        for (_, info) in index.types_with_inheritance_name(&name) {
            changed |= sweep.consider(info.symbol, false);
        }
    }

    if sweep.kind == DependentTypeKind::DerivedClasses {
        let roots: Vec<SmolStr> = sweep
            .frontier
            .iter()
            .map(|t| solution.symbol(t).key.clone())
            .collect();
        for key in roots {
            for info in index.implicit_derivations(&key) {
                changed |= sweep.consider(info.symbol, true);
            }
        }
    }
    changed
}

fn metadata_name_index(
    finder: &SymbolFinder,
    solution: &Solution,
    assembly: &str,
) -> Arc<MetadataNameIndex> {
    let key = SmolStr::new(assembly.to_ascii_lowercase());
    finder.metadata_names.entries.get_or_insert_with(solution, key, || {
        let mut index = MetadataNameIndex::default();
        let mut seen: FxHashSet<SmolStr> = FxHashSet::default();
        for id in (0..solution.symbol_count() as u32).map(SymbolId::new) {
            let data = solution.symbol(id);
            let in_assembly = data
                .containing_assembly
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(assembly));
            if !data.is_type()
                || !matches!(data.origin, SymbolOrigin::Metadata { .. })
                || !in_assembly
                || !seen.insert(data.key.clone())
            {
                continue;
            }
            for &related in data.base_type.iter().chain(&data.interfaces) {
                index
                    .by_base_name
                    .entry(solution.symbol(related).name.clone())
                    .or_default()
                    .push(data.key.clone());
            }
        }
        Arc::new(index)
    })
}
