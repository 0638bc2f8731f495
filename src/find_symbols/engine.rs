//! The find-references pipeline.
//!
//! ```text
//! producer (serial, topological)          workers (rayon)
//! ─────────────────────────────           ─────────────────────────────
//! for project in scope:
//!     cascade symbol set
//!     report new groups
//!     spawn ───────────────────────────▶  project: documents to search
//!                                             spawn per document ──▶ scan, report
//! ```
//!
//! Explicit searches run on the global rayon pool. Implicit searches share a
//! single-thread pool so they never run side by side.

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;

use crate::base::{DocumentId, ProjectId, SymbolId};
use crate::error::{FindError, Result, check_cancelled};
use crate::hir::Solution;

use super::SymbolFinder;
use super::dependent_projects::dependent_projects;
use super::document_cache::FindReferenceCache;
use super::equivalence::SymbolIdentity;
use super::finders::ReferenceFinder;
use super::group::SymbolGroup;
use super::options::FindReferencesSearchOptions;
use super::pool::DOCUMENT_MAPS;
use super::progress::{FindReferencesProgress, ReferenceLocation};
use super::symbol_set::{SearchContext, SymbolSet};

/// One find-references run over a solution snapshot.
pub struct FindReferencesSearchEngine<'a> {
    finder: &'a SymbolFinder,
    solution: &'a Solution,
    documents: Option<&'a FxHashSet<DocumentId>>,
    progress: &'a dyn FindReferencesProgress,
    options: FindReferencesSearchOptions,
    /// Serializes progress callbacks.
    callbacks: Mutex<()>,
}

/// Calls `on_completed` however the search ends.
struct CompletionGuard<'a>(&'a dyn FindReferencesProgress);

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.0.on_completed();
    }
}

impl<'a> FindReferencesSearchEngine<'a> {
    /// `documents` restricts the search to those documents; `None` searches
    /// the whole solution.
    pub fn new(
        finder: &'a SymbolFinder,
        solution: &'a Solution,
        documents: Option<&'a FxHashSet<DocumentId>>,
        progress: &'a dyn FindReferencesProgress,
        options: FindReferencesSearchOptions,
    ) -> Self {
        Self {
            finder,
            solution,
            documents,
            progress,
            options,
            callbacks: Mutex::new(()),
        }
    }

    /// Report every reference to `symbols` to the progress sink.
    ///
    /// The first failure in any project or document aborts the whole search
    /// and is returned; no partial result is salvaged.
    #[tracing::instrument(
        skip_all,
        fields(symbols = symbols.len(), explicit = self.options.explicit)
    )]
    pub fn find_references(&self, symbols: &[SymbolId], cancel: &CancellationToken) -> Result<()> {
        self.progress.on_started();
        let _completed = CompletionGuard(self.progress);
        let result = self.find_references_core(symbols, cancel);
        match &result {
            Ok(()) => tracing::debug!("search finished"),
            Err(err) if err.is_cancelled() => tracing::debug!("search cancelled"),
            Err(err) => tracing::debug!(%err, "search failed"),
        }
        result
    }

    fn find_references_core(&self, symbols: &[SymbolId], cancel: &CancellationToken) -> Result<()> {
        // Cancelled by the first failing unit so that its siblings unwind.
        let cancel = cancel.child_token();
        let ctx = SearchContext {
            finder: self.finder,
            solution: self.solution,
            options: self.options,
            cancel: &cancel,
        };
        check_cancelled(&cancel)?;

        let mut symbol_set = SymbolSet::create(&ctx, symbols)?;
        let mut groups = GroupMap::default();
        for symbol in symbol_set.all_symbols() {
            self.group_for(symbol, &mut groups);
        }

        let projects = self.projects_to_search(&symbol_set)?;
        tracing::debug!(
            projects = projects.len(),
            groups = groups.reported,
            "search scope computed"
        );

        let failure: Mutex<Option<FindError>> = Mutex::new(None);
        let mut run = || {
            rayon::scope(|scope| {
                for &project in &projects {
                    if let Err(err) = check_cancelled(&cancel) {
                        self.fail(&failure, &cancel, err);
                        return;
                    }
                    if let Err(err) = symbol_set.inheritance_cascade(&ctx, project) {
                        self.fail(&failure, &cancel, err);
                        return;
                    }
                    let targets: Vec<(SymbolId, SymbolGroup)> = symbol_set
                        .all_symbols()
                        .into_iter()
                        .map(|symbol| (symbol, self.group_for(symbol, &mut groups)))
                        .collect();

                    let failure = &failure;
                    scope.spawn(move |scope| {
                        let searched = self.search_project(ctx, project, targets, scope, failure);
                        if let Err(err) = searched {
                            self.fail(failure, ctx.cancel, err);
                        }
                    });
                }
            });
        };

        if self.options.explicit {
            run();
        } else {
            self.finder.exclusive_lane()?.install(run);
        }

        match failure.into_inner() {
            Some(err) => Err(err),
            // Cancelled after the last document had already started.
            None => check_cancelled(&cancel),
        }
    }

    /// Projects that could reference any symbol of the set, in topological
    /// order, limited to the projects of the document scope.
    fn projects_to_search(&self, symbol_set: &SymbolSet) -> Result<Vec<ProjectId>> {
        let solution = self.solution;
        let document_projects = match self.documents {
            Some(documents) => {
                let mut projects = FxHashSet::default();
                for &document in documents {
                    let document = solution
                        .document(document)
                        .ok_or(FindError::MissingDocument(document))?;
                    projects.insert(document.project);
                }
                Some(projects)
            }
            None => None,
        };

        let mut projects: FxHashSet<ProjectId> = FxHashSet::default();
        for symbol in symbol_set.all_symbols() {
            projects.extend(dependent_projects(
                solution,
                symbol,
                document_projects.as_ref(),
                &self.finder.dependent_projects,
            ));
        }
        Ok(solution
            .dependency_graph()
            .topologically_sorted()
            .iter()
            .copied()
            .filter(|p| projects.contains(p))
            .collect())
    }

    fn search_project<'s>(
        &'s self,
        ctx: SearchContext<'s>,
        project: ProjectId,
        targets: Vec<(SymbolId, SymbolGroup)>,
        scope: &rayon::Scope<'s>,
        failure: &'s Mutex<Option<FindError>>,
    ) -> Result<()> {
        check_cancelled(ctx.cancel)?;
        let group_of: FxHashMap<SymbolIdentity, SymbolGroup> = targets
            .iter()
            .map(|(symbol, group)| (SymbolIdentity::of(self.solution, *symbol), group.clone()))
            .collect();

        let mut documents = DOCUMENT_MAPS.get();
        for &(symbol, _) in &targets {
            check_cancelled(ctx.cancel)?;
            for finder in ReferenceFinder::ALL {
                let found =
                    finder.determine_documents_to_search(&ctx, symbol, project, self.documents)?;
                for document in found {
                    let symbols = documents.entry(document).or_default();
                    if !symbols.contains(&symbol) {
                        symbols.push(symbol);
                    }
                }
            }
        }
        tracing::debug!(%project, documents = documents.len(), "documents scheduled");

        for (document, symbols) in documents.drain(..) {
            check_cancelled(ctx.cancel)?;
            let targets: Vec<(SymbolId, SymbolGroup)> = symbols
                .into_iter()
                .filter_map(|s| {
                    let group = group_of.get(&SymbolIdentity::of(self.solution, s))?;
                    Some((s, group.clone()))
                })
                .collect();
            scope.spawn(move |_| {
                if let Err(err) = self.search_document(ctx, document, &targets) {
                    self.fail(failure, ctx.cancel, err);
                }
            });
        }
        Ok(())
    }

    fn search_document(
        &self,
        ctx: SearchContext<'_>,
        document: DocumentId,
        targets: &[(SymbolId, SymbolGroup)],
    ) -> Result<()> {
        check_cancelled(ctx.cancel)?;
        let model = self
            .solution
            .semantic_model(document)
            .ok_or(FindError::MissingDocument(document))?;

        self.start_document(ctx.cancel, document)?;
        let result = self.scan_document(ctx, FindReferenceCache::new(model), targets);
        self.report(|p| p.on_find_in_document_completed(document));
        result
    }

    fn scan_document(
        &self,
        ctx: SearchContext<'_>,
        cache: FindReferenceCache<'_>,
        targets: &[(SymbolId, SymbolGroup)],
    ) -> Result<()> {
        let mut warmed = FxHashSet::default();
        for &(symbol, _) in targets {
            let name = &self.solution.symbol(symbol).name;
            if warmed.insert(name.clone()) {
                cache.find_matching_identifier_tokens(name);
            }
        }

        for (symbol, group) in targets {
            check_cancelled(ctx.cancel)?;
            for finder in ReferenceFinder::ALL {
                for location in finder.find_references_in_document(&ctx, *symbol, &cache)? {
                    tracing::trace!(%symbol, document = %location.document, "reference found");
                    self.report_reference(group, *symbol, &location);
                }
            }
        }
        Ok(())
    }

    /// The group of `symbol`, reporting it the first time it is seen.
    fn group_for(&self, symbol: SymbolId, groups: &mut GroupMap) -> SymbolGroup {
        if let Some(group) = groups.by_symbol.get(&SymbolIdentity::of(self.solution, symbol)) {
            return group.clone();
        }
        let group = SymbolGroup::for_symbol(self.solution, symbol);
        for &member in group.symbols() {
            groups
                .by_symbol
                .insert(SymbolIdentity::of(self.solution, member), group.clone());
        }
        groups.reported += 1;
        self.report(|p| p.on_definition_found(&group));
        group
    }

    fn report_reference(
        &self,
        group: &SymbolGroup,
        symbol: SymbolId,
        location: &ReferenceLocation,
    ) {
        self.report(|p| p.on_reference_found(group, symbol, location));
    }

    /// Announce `document` unless the search was cancelled.
    ///
    /// The check runs under the callback lock, so no document starts after
    /// a callback has observed or caused cancellation.
    fn start_document(&self, cancel: &CancellationToken, document: DocumentId) -> Result<()> {
        let _serialized = self.callbacks.lock();
        check_cancelled(cancel)?;
        self.progress.on_find_in_document_started(document);
        Ok(())
    }

    fn report(&self, callback: impl FnOnce(&dyn FindReferencesProgress)) {
        let _serialized = self.callbacks.lock();
        callback(self.progress);
    }

    /// Keep the first error and stop everything else.
    fn fail(&self, failure: &Mutex<Option<FindError>>, cancel: &CancellationToken, err: FindError) {
        {
            let mut slot = failure.lock();
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        cancel.cancel();
    }
}

#[derive(Default)]
struct GroupMap {
    by_symbol: FxHashMap<SymbolIdentity, SymbolGroup>,
    reported: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::find_symbols::progress::{CollectingProgress, ProgressEvent};
    use crate::hir::{SolutionBuilder, SymbolKind, TypeKind};

    fn widget_solution() -> (Solution, SymbolId, DocumentId, DocumentId) {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("Shop");
        let d1 = b.add_document(p, "Widget.cs", "class Widget { void Spin() {} }");
        let d2 = b.add_document(p, "Use.cs", "class Use { Widget w; void F() { w.Spin(); } }");
        let widget = b.declare_type(d1, "Widget", TypeKind::Class).id();
        let spin = b.declare_member(widget, "Spin", SymbolKind::Method).id();
        b.declare_type(d2, "Use", TypeKind::Class);
        b.bind(d2, "Widget", widget);
        b.bind(d2, "Spin", spin);
        (b.build().unwrap(), spin, d1, d2)
    }

    #[test]
    fn test_reports_definition_then_reference() {
        let (solution, spin, _, d2) = widget_solution();
        let finder = SymbolFinder::new();
        let progress = CollectingProgress::new();
        let engine = FindReferencesSearchEngine::new(
            &finder,
            &solution,
            None,
            &progress,
            FindReferencesSearchOptions::default(),
        );
        engine.find_references(&[spin], &CancellationToken::new()).unwrap();

        let events = progress.events();
        assert_eq!(events.first(), Some(&ProgressEvent::Started));
        assert_eq!(events.last(), Some(&ProgressEvent::Completed));
        let refs = progress.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].2.document, d2);
        assert_eq!(progress.definitions(), vec![refs[0].0.clone()]);
    }

    #[test]
    fn test_equivalent_instances_share_one_group() {
        let mut b = SolutionBuilder::new();
        let p1 = b.add_project("A");
        let p2 = b.add_project("B");
        b.add_metadata_reference(p1, "Lib");
        b.add_metadata_reference(p2, "Lib");
        b.declare_metadata_type("Lib", "Lib.Api", TypeKind::Class);
        let solution = b.build().unwrap();
        let a = solution.resolve_key(p1, "T:Lib.Api").unwrap();
        let c = solution.resolve_key(p2, "T:Lib.Api").unwrap();
        assert_ne!(a, c);

        let finder = SymbolFinder::new();
        let progress = CollectingProgress::new();
        let engine = FindReferencesSearchEngine::new(
            &finder,
            &solution,
            None,
            &progress,
            FindReferencesSearchOptions::default(),
        );
        let mut groups = GroupMap::default();
        let first = engine.group_for(a, &mut groups);
        let second = engine.group_for(c, &mut groups);
        assert_eq!(first, second);
        assert_eq!(groups.reported, 1);
        assert_eq!(progress.definitions().len(), 1);
    }

    #[test]
    fn test_document_scope_limits_results() {
        let (solution, spin, d1, _) = widget_solution();
        let finder = SymbolFinder::new();
        let progress = CollectingProgress::new();
        let scope: FxHashSet<DocumentId> = [d1].into_iter().collect();
        let engine = FindReferencesSearchEngine::new(
            &finder,
            &solution,
            Some(&scope),
            &progress,
            FindReferencesSearchOptions::default().with_explicit(false),
        );
        engine.find_references(&[spin], &CancellationToken::new()).unwrap();
        assert!(progress.references().is_empty());
        assert_eq!(progress.definitions().len(), 1);
    }

    #[test]
    fn test_missing_scope_document_fails_but_completes() {
        let (solution, spin, _, _) = widget_solution();
        let finder = SymbolFinder::new();
        let progress = CollectingProgress::new();
        let scope: FxHashSet<DocumentId> = [DocumentId::new(99)].into_iter().collect();
        let engine = FindReferencesSearchEngine::new(
            &finder,
            &solution,
            Some(&scope),
            &progress,
            FindReferencesSearchOptions::default(),
        );
        let err = engine
            .find_references(&[spin], &CancellationToken::new())
            .unwrap_err();
        assert_eq!(err, FindError::MissingDocument(DocumentId::new(99)));
        assert_eq!(progress.events().last(), Some(&ProgressEvent::Completed));
    }
}
