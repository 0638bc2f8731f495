//! Immutable solution snapshots: projects, documents and their symbols.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::graph::DependencyGraph;
use super::semantic::SemanticModel;
use super::symbols::{SymbolData, SymbolInfo, SymbolOrigin};
use crate::base::{DocumentId, LineIndex, ProjectId, SolutionId, SymbolId, TextSize};
pub use crate::syntax::Language;
use crate::syntax::{SyntaxTree, SyntaxTreeIndex};

/// An assembly known to the solution, either built from a project or
/// referenced as metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyInfo {
    pub name: SmolStr,
    /// Raw `InternalsVisibleTo` arguments, e.g. `"Tests, PublicKey=00a1"`.
    pub internals_visible_to: Vec<SmolStr>,
}

#[derive(Clone, Debug)]
pub struct Project {
    pub id: ProjectId,
    pub name: SmolStr,
    pub assembly_name: SmolStr,
    pub language: Language,
    pub project_references: Vec<ProjectId>,
    /// Assembly names of metadata references (direct only).
    pub metadata_references: Vec<SmolStr>,
    pub documents: Vec<DocumentId>,
    /// Set for interactive submissions; the submission this one continues.
    pub previous_submission: Option<ProjectId>,
    pub is_submission: bool,
    /// Alias symbols declared project-wide (`global using W = ...;`).
    pub global_aliases: Vec<SymbolId>,
}

#[derive(Clone, Debug)]
pub struct Document {
    pub id: DocumentId,
    pub project: ProjectId,
    /// Documents of different projects sharing a path are linked.
    pub path: SmolStr,
    pub text: Arc<str>,
    pub syntax: SyntaxTree,
    pub index: SyntaxTreeIndex,
    pub line_index: LineIndex,
    pub(crate) bindings: FxHashMap<TextSize, SymbolInfo>,
    pub(crate) alias_bindings: FxHashMap<TextSize, SymbolId>,
    pub(crate) declarations: FxHashMap<TextSize, SymbolId>,
}

pub(crate) struct SolutionData {
    pub(crate) id: SolutionId,
    pub(crate) projects: IndexMap<ProjectId, Project>,
    pub(crate) documents: Vec<Document>,
    pub(crate) symbols: Vec<SymbolData>,
    pub(crate) graph: DependencyGraph,
    pub(crate) assemblies: FxHashMap<SmolStr, AssemblyInfo>,
    /// (compilation, key) -> metadata symbol instance.
    pub(crate) metadata_instances: FxHashMap<(ProjectId, SmolStr), SymbolId>,
    /// (declaring project, key) -> source symbol.
    pub(crate) source_symbols: FxHashMap<(ProjectId, SmolStr), SymbolId>,
    pub(crate) documents_by_path: FxHashMap<SmolStr, Vec<DocumentId>>,
    /// Metadata assemblies visible to each compilation, transitive references included.
    pub(crate) visible_assemblies: FxHashMap<ProjectId, Vec<SmolStr>>,
}

/// A cheap-to-clone handle to one immutable solution snapshot.
///
/// All projects, documents and symbols reachable from a `Solution` are
/// frozen. Producing a changed solution means building a new snapshot,
/// which gets a new [`SolutionId`].
#[derive(Clone)]
pub struct Solution(pub(crate) Arc<SolutionData>);

/// A non-owning handle used by caches to notice when a snapshot is gone.
#[derive(Clone)]
pub struct WeakSolution(Weak<SolutionData>);

impl WeakSolution {
    pub fn upgrade(&self) -> Option<Solution> {
        self.0.upgrade().map(Solution)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl Solution {
    pub fn id(&self) -> SolutionId {
        self.0.id
    }

    pub fn downgrade(&self) -> WeakSolution {
        WeakSolution(Arc::downgrade(&self.0))
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.0.projects.values()
    }

    pub fn project_ids(&self) -> impl Iterator<Item = ProjectId> + '_ {
        self.0.projects.keys().copied()
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.0.projects.get(&id)
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.0.documents.get(id.index() as usize)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.0.documents.iter()
    }

    /// Symbol data for an id produced by this snapshot.
    ///
    /// # Panics
    /// Panics if `id` was not produced by this snapshot.
    pub fn symbol(&self, id: SymbolId) -> &SymbolData {
        &self.0.symbols[id.index() as usize]
    }

    pub fn try_symbol(&self, id: SymbolId) -> Option<&SymbolData> {
        self.0.symbols.get(id.index() as usize)
    }

    pub fn symbol_count(&self) -> usize {
        self.0.symbols.len()
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.0.graph
    }

    pub fn assembly(&self, name: &str) -> Option<&AssemblyInfo> {
        self.0.assemblies.get(name)
    }

    pub fn semantic_model(&self, document: DocumentId) -> Option<SemanticModel<'_>> {
        self.document(document).map(|doc| SemanticModel::new(self, doc))
    }

    /// The source project that produces the assembly `name`, if any.
    pub fn project_for_assembly(&self, name: &str) -> Option<ProjectId> {
        self.projects()
            .find(|p| p.assembly_name.eq_ignore_ascii_case(name))
            .map(|p| p.id)
    }

    /// Every document of the solution sharing `document`'s path, itself included.
    pub fn linked_documents(&self, document: DocumentId) -> &[DocumentId] {
        self.document(document)
            .and_then(|doc| self.0.documents_by_path.get(&doc.path))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Metadata assemblies visible to `project`'s compilation.
    pub fn visible_metadata_assemblies(&self, project: ProjectId) -> &[SmolStr] {
        self.0
            .visible_assemblies
            .get(&project)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Whether `project`'s compilation references the assembly `name`,
    /// through metadata or through a project reference.
    pub fn references_assembly(&self, project: ProjectId, name: &str) -> bool {
        if self
            .visible_metadata_assemblies(project)
            .iter()
            .any(|a| a.eq_ignore_ascii_case(name))
        {
            return true;
        }
        self.project_for_assembly(name)
            .is_some_and(|origin| self.0.graph.depends_on(project, origin))
    }

    /// The symbol instance for `key` as `project`'s compilation sees it.
    pub fn resolve_key(&self, project: ProjectId, key: &str) -> Option<SymbolId> {
        let key = SmolStr::new(key);
        if let Some(&id) = self.0.metadata_instances.get(&(project, key.clone())) {
            return Some(id);
        }
        std::iter::once(project)
            .chain(self.0.graph.transitive_dependencies(project))
            .find_map(|p| self.0.source_symbols.get(&(p, key.clone())).copied())
    }

    /// For a metadata symbol, the source declaration in the project that
    /// builds its assembly.
    pub fn find_source_definition(&self, symbol: SymbolId) -> Option<SymbolId> {
        let data = self.symbol(symbol);
        if !matches!(data.origin, SymbolOrigin::Metadata { .. }) {
            return None;
        }
        let project = self.project_for_assembly(data.containing_assembly.as_deref()?)?;
        self.0
            .source_symbols
            .get(&(project, data.key.clone()))
            .copied()
    }

    /// The source symbol declared at exactly `offset` in `document`.
    pub fn declared_symbol_at(&self, document: DocumentId, offset: TextSize) -> Option<SymbolId> {
        self.document(document)?.declarations.get(&offset).copied()
    }

    /// All symbols declared in `document`, in no particular order.
    pub fn declared_symbols(&self, document: DocumentId) -> impl Iterator<Item = SymbolId> + '_ {
        self.document(document)
            .into_iter()
            .flat_map(|doc| doc.declarations.values().copied())
    }
}

impl std::fmt::Debug for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solution")
            .field("id", &self.0.id)
            .field("projects", &self.0.projects.len())
            .field("documents", &self.0.documents.len())
            .field("symbols", &self.0.symbols.len())
            .finish()
    }
}
