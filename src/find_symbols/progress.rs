//! Reporting results while a search runs.

use parking_lot::Mutex;

use crate::base::{DocumentId, SymbolId, TextRange};
use crate::hir::{CandidateReason, ValueUsage};

use super::group::SymbolGroup;

/// One place in source that refers to a searched symbol.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReferenceLocation {
    pub document: DocumentId,
    pub range: TextRange,
    /// The alias the reference was written through (`W` in `using W = Widget;`).
    pub alias: Option<SymbolId>,
    /// True when the reference has no name token of its own, such as the
    /// `new` of a target-typed object creation.
    pub is_implicit: bool,
    /// Set when the token only bound to the symbol as a candidate.
    pub candidate_reason: Option<CandidateReason>,
    pub usage: ValueUsage,
}

impl ReferenceLocation {
    pub fn is_candidate(&self) -> bool {
        self.candidate_reason.is_some()
    }
}

/// Receives results while a search runs.
///
/// Callbacks arrive from worker threads but never concurrently: the engine
/// serializes them. Every group is reported through
/// [`on_definition_found`](Self::on_definition_found) before any reference
/// to one of its symbols.
pub trait FindReferencesProgress: Send + Sync {
    fn on_started(&self) {}

    /// Called exactly once per search, after everything else, even when the
    /// search fails or is cancelled.
    fn on_completed(&self) {}

    fn on_definition_found(&self, _group: &SymbolGroup) {}

    fn on_reference_found(
        &self,
        _group: &SymbolGroup,
        _symbol: SymbolId,
        _location: &ReferenceLocation,
    ) {
    }

    fn on_find_in_document_started(&self, _document: DocumentId) {}

    fn on_find_in_document_completed(&self, _document: DocumentId) {}
}

/// Ignores every callback.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpProgress;

impl FindReferencesProgress for NoOpProgress {}

/// A recorded progress callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    Started,
    Completed,
    DefinitionFound(SymbolGroup),
    ReferenceFound {
        group: SymbolGroup,
        symbol: SymbolId,
        location: ReferenceLocation,
    },
    DocumentStarted(DocumentId),
    DocumentCompleted(DocumentId),
}

/// Records every callback in arrival order.
#[derive(Debug, Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// Groups in the order they were reported.
    pub fn definitions(&self) -> Vec<SymbolGroup> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::DefinitionFound(group) => Some(group.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn references(&self) -> Vec<(SymbolGroup, SymbolId, ReferenceLocation)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::ReferenceFound {
                    group,
                    symbol,
                    location,
                } => Some((group.clone(), *symbol, location.clone())),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }
}

impl FindReferencesProgress for CollectingProgress {
    fn on_started(&self) {
        self.push(ProgressEvent::Started);
    }

    fn on_completed(&self) {
        self.push(ProgressEvent::Completed);
    }

    fn on_definition_found(&self, group: &SymbolGroup) {
        self.push(ProgressEvent::DefinitionFound(group.clone()));
    }

    fn on_reference_found(
        &self,
        group: &SymbolGroup,
        symbol: SymbolId,
        location: &ReferenceLocation,
    ) {
        self.push(ProgressEvent::ReferenceFound {
            group: group.clone(),
            symbol,
            location: location.clone(),
        });
    }

    fn on_find_in_document_started(&self, document: DocumentId) {
        self.push(ProgressEvent::DocumentStarted(document));
    }

    fn on_find_in_document_completed(&self, document: DocumentId) {
        self.push(ProgressEvent::DocumentCompleted(document));
    }
}
