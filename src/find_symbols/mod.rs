//! The find-references engine.
//!
//! [`SymbolFinder`] is the entry point. It owns the caches that outlive a
//! single search (dependent projects, dependent types, project indexes) and
//! the exclusive scheduling lane shared by implicit searches.
//!
//! ## Module map
//!
//! - [`equivalence`]: symbol identity across compilations
//! - [`group`]: linked declarations reported as one definition
//! - [`dependent_projects`], [`dependent_types`], [`inheritance`]: who can
//!   see, derive from or implement a symbol
//! - [`symbol_set`]: the growing set of symbols to search for
//! - [`finders`]: per-kind document selection and token matching
//! - [`engine`]: the concurrent pipeline reporting to a [`FindReferencesProgress`]

mod cache;
pub mod dependent_projects;
pub mod dependent_types;
pub mod document_cache;
pub mod engine;
pub mod equivalence;
pub mod finders;
pub mod group;
pub mod inheritance;
pub mod options;
mod pool;
pub mod progress;
pub mod project_index;
pub mod remote;
pub mod symbol_set;

pub use dependent_projects::{DependentProject, DependentProjectsCache};
pub use dependent_types::{
    DependentTypeKind, find_derived_classes, find_derived_interfaces, find_implementing_types,
};
pub use document_cache::FindReferenceCache;
pub use engine::FindReferencesSearchEngine;
pub use equivalence::{MetadataUnifyingSymbolSet, SymbolIdentity, symbols_equivalent};
pub use finders::ReferenceFinder;
pub use group::{SymbolGroup, linked_symbols};
pub use options::FindReferencesSearchOptions;
pub use progress::{
    CollectingProgress, FindReferencesProgress, NoOpProgress, ProgressEvent, ReferenceLocation,
};
pub use remote::{DependentTypesRequest, RemoteError, RemoteHostClient, SerializedSymbol};
pub use symbol_set::{SearchContext, SymbolSet};

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use rustc_hash::FxHashSet;
use tokio_util::sync::CancellationToken;

use crate::base::{DocumentId, ProjectId, SymbolId};
use crate::error::{FindError, Result};
use crate::hir::Solution;

use dependent_types::{DependentTypesCache, MetadataNameIndexCache};
use project_index::ProjectIndexCache;

/// A definition with the references found to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferencedSymbol {
    pub definition: SymbolGroup,
    /// References in discovery order.
    pub locations: Vec<(SymbolId, ReferenceLocation)>,
}

/// Long-lived search service.
///
/// Caches are keyed by solution snapshot and drop their entries once the
/// snapshot is gone, so one finder can serve many snapshots.
#[derive(Default)]
pub struct SymbolFinder {
    pub(crate) dependent_projects: DependentProjectsCache,
    pub(crate) dependent_types: DependentTypesCache,
    pub(crate) project_indexes: ProjectIndexCache,
    pub(crate) metadata_names: MetadataNameIndexCache,
    pub(crate) remote: Option<Arc<dyn RemoteHostClient>>,
    exclusive: OnceCell<rayon::ThreadPool>,
}

impl SymbolFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try `client` first for dependent-type searches.
    pub fn with_remote_client(mut self, client: Arc<dyn RemoteHostClient>) -> Self {
        self.remote = Some(client);
        self
    }

    /// The single-thread pool implicit searches are serialized on.
    pub(crate) fn exclusive_lane(&self) -> Result<&rayon::ThreadPool> {
        self.exclusive.get_or_try_init(|| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(1)
                .thread_name(|_| "refscope-exclusive".to_string())
                .build()
                .map_err(|err| FindError::Scheduler(err.to_string()))
        })
    }

    /// Stream references to `symbols` into `progress`.
    ///
    /// `documents` restricts the search; `None` searches the whole solution.
    pub fn find_references(
        &self,
        solution: &Solution,
        symbols: &[SymbolId],
        documents: Option<&FxHashSet<DocumentId>>,
        progress: &dyn FindReferencesProgress,
        options: FindReferencesSearchOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        FindReferencesSearchEngine::new(self, solution, documents, progress, options)
            .find_references(symbols, cancel)
    }

    /// Run a search and gather its results per definition.
    ///
    /// Definitions without references are dropped unless
    /// `display_all_definitions` is set or they contain a starting symbol.
    pub fn find_references_collect(
        &self,
        solution: &Solution,
        symbols: &[SymbolId],
        documents: Option<&FxHashSet<DocumentId>>,
        options: FindReferencesSearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReferencedSymbol>> {
        let progress = CollectingProgress::new();
        self.find_references(solution, symbols, documents, &progress, options, cancel)?;

        let mut starting = MetadataUnifyingSymbolSet::new();
        for &symbol in symbols {
            starting.insert(solution, symbol_set::appropriate_symbol(solution, symbol)?);
        }

        let mut results: IndexMap<SymbolGroup, Vec<(SymbolId, ReferenceLocation)>> =
            IndexMap::new();
        for event in progress.events() {
            match event {
                ProgressEvent::DefinitionFound(group) => {
                    results.entry(group).or_default();
                }
                ProgressEvent::ReferenceFound {
                    group,
                    symbol,
                    location,
                } => results.entry(group).or_default().push((symbol, location)),
                _ => {}
            }
        }

        Ok(results
            .into_iter()
            .filter(|(group, locations)| {
                !locations.is_empty()
                    || options.display_all_definitions
                    || group.symbols().iter().any(|&s| starting.contains(solution, s))
            })
            .map(|(definition, locations)| ReferencedSymbol {
                definition,
                locations,
            })
            .collect())
    }

    pub fn find_derived_classes(
        &self,
        solution: &Solution,
        ty: SymbolId,
        transitive: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<SymbolId>> {
        find_derived_classes(self, solution, ty, None, transitive, cancel)
    }

    pub fn find_derived_interfaces(
        &self,
        solution: &Solution,
        ty: SymbolId,
        transitive: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<SymbolId>> {
        find_derived_interfaces(self, solution, ty, None, transitive, cancel)
    }

    pub fn find_implementing_types(
        &self,
        solution: &Solution,
        ty: SymbolId,
        transitive: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<SymbolId>> {
        find_implementing_types(self, solution, ty, None, transitive, cancel)
    }

    /// Implementations of an interface or interface member, or overrides of
    /// a virtual member.
    pub fn find_implementations(
        &self,
        solution: &Solution,
        symbol: SymbolId,
        cancel: &CancellationToken,
    ) -> Result<Vec<SymbolId>> {
        let data = solution
            .try_symbol(symbol)
            .ok_or(FindError::UnknownSymbol(symbol))?;
        if data.is_interface() {
            return find_implementing_types(self, solution, symbol, None, true, cancel);
        }
        let in_interface = data
            .container
            .is_some_and(|c| solution.symbol(c).is_interface());
        if in_interface {
            return inheritance::find_member_implementations(self, solution, symbol, None, cancel);
        }
        if data.is_overridable() {
            return inheritance::find_overrides(self, solution, symbol, None, cancel);
        }
        Ok(Vec::new())
    }

    pub fn find_overrides(
        &self,
        solution: &Solution,
        symbol: SymbolId,
        cancel: &CancellationToken,
    ) -> Result<Vec<SymbolId>> {
        if solution.try_symbol(symbol).is_none() {
            return Err(FindError::UnknownSymbol(symbol));
        }
        inheritance::find_overrides(self, solution, symbol, None, cancel)
    }

    /// Projects that could reference `symbol`, in topological order.
    pub fn dependent_projects(
        &self,
        solution: &Solution,
        symbol: SymbolId,
        scope: Option<&FxHashSet<ProjectId>>,
    ) -> Result<Vec<ProjectId>> {
        if solution.try_symbol(symbol).is_none() {
            return Err(FindError::UnknownSymbol(symbol));
        }
        if let Some(missing) = scope
            .into_iter()
            .flatten()
            .find(|&&p| solution.project(p).is_none())
        {
            return Err(FindError::MissingProject(*missing));
        }
        Ok(dependent_projects::dependent_projects(
            solution,
            symbol,
            scope,
            &self.dependent_projects,
        ))
    }
}

impl std::fmt::Debug for SymbolFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolFinder")
            .field("remote", &self.remote.is_some())
            .field("exclusive_lane", &self.exclusive.get().is_some())
            .finish_non_exhaustive()
    }
}
