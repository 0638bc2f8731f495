//! Construction of solution snapshots.
//!
//! The builder plays the part of the compiler front end: callers describe
//! projects, documents, declarations and the binding of identifier
//! occurrences, and [`SolutionBuilder::build`] freezes everything into a
//! [`Solution`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut b = SolutionBuilder::new();
//! let p1 = b.add_project("P1");
//! let d1 = b.add_document(p1, "I.cs", "interface I { void M(); }");
//! let i = b.declare_type(d1, "I", TypeKind::Interface).id();
//! let m = b.declare_member(i, "M", SymbolKind::Method).signature("()").id();
//! let solution = b.build()?;
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use super::graph::DependencyGraph;
use super::solution::{AssemblyInfo, Document, Language, Project, Solution, SolutionData};
use super::symbols::{
    Accessibility, CandidateReason, MethodKind, Modifiers, SourceLocation, SymbolData,
    SymbolInfo, SymbolKind, SymbolOrigin, TypeKind, ValueUsage,
};
use crate::base::{DocumentId, LineIndex, ProjectId, SolutionId, SymbolId, TextRange, TextSize};
use crate::syntax::{SyntaxTree, SyntaxTreeIndex, TokenKind, fold_case};

/// Errors detected while freezing a solution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("project references form a cycle through {0}")]
    CyclicReference(ProjectId),

    #[error("identifier '{name}' (occurrence {occurrence}) not found in {document}")]
    OccurrenceNotFound {
        document: DocumentId,
        name: SmolStr,
        occurrence: usize,
    },

    #[error("{project} does not reference metadata assembly '{assembly}'")]
    AssemblyNotVisible { project: ProjectId, assembly: SmolStr },

    #[error("unknown metadata assembly '{0}'")]
    UnknownAssembly(SmolStr),
}

/// Handle to a metadata symbol template; instantiated per referencing compilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MetadataSymbolId(u32);

/// A symbol reference usable before the solution is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolRef {
    Source(SymbolId),
    Metadata(MetadataSymbolId),
}

impl From<SymbolId> for SymbolRef {
    fn from(id: SymbolId) -> Self {
        SymbolRef::Source(id)
    }
}

impl From<MetadataSymbolId> for SymbolRef {
    fn from(id: MetadataSymbolId) -> Self {
        SymbolRef::Metadata(id)
    }
}

#[derive(Clone, Debug)]
struct DeclSite {
    document: DocumentId,
    occurrence: usize,
}

#[derive(Clone, Debug)]
struct SymbolDraft {
    name: SmolStr,
    kind: SymbolKind,
    type_kind: Option<TypeKind>,
    method_kind: Option<MethodKind>,
    accessibility: Accessibility,
    modifiers: Modifiers,
    namespace: Option<SmolStr>,
    container: Option<SymbolRef>,
    signature: SmolStr,
    base_type: Option<SymbolRef>,
    interfaces: Vec<SymbolRef>,
    overridden: Option<SymbolRef>,
    explicit_implementations: Vec<SymbolRef>,
    /// For accessors: the owning property or event.
    associated: Option<SymbolRef>,
    alias_target: Option<SymbolRef>,
    original_definition: Option<SymbolRef>,
    /// Source drafts: declaring project. Metadata drafts: unused.
    project: Option<ProjectId>,
    /// Source drafts: where the name token is. `None` for accessors and constructed forms.
    site: Option<DeclSite>,
    /// Metadata drafts: defining assembly.
    assembly: Option<SmolStr>,
}

impl SymbolDraft {
    fn new(name: &str, kind: SymbolKind) -> Self {
        Self {
            name: SmolStr::new(name),
            kind,
            type_kind: None,
            method_kind: (kind == SymbolKind::Method).then_some(MethodKind::Ordinary),
            accessibility: Accessibility::Public,
            modifiers: Modifiers::default(),
            namespace: None,
            container: None,
            signature: SmolStr::default(),
            base_type: None,
            interfaces: Vec::new(),
            overridden: None,
            explicit_implementations: Vec::new(),
            associated: None,
            alias_target: None,
            original_definition: None,
            project: None,
            site: None,
            assembly: None,
        }
    }
}

#[derive(Clone, Debug)]
struct ProjectDraft {
    name: SmolStr,
    assembly_name: SmolStr,
    language: Language,
    project_references: Vec<ProjectId>,
    metadata_references: Vec<SmolStr>,
    internals_visible_to: Vec<SmolStr>,
    previous_submission: Option<ProjectId>,
    is_submission: bool,
    global_aliases: Vec<SymbolId>,
    documents: Vec<DocumentId>,
}

#[derive(Clone, Debug)]
struct DocumentDraft {
    project: ProjectId,
    path: SmolStr,
    text: Arc<str>,
    linked_from: Option<DocumentId>,
}

#[derive(Clone, Debug)]
struct BindingDraft {
    document: DocumentId,
    name: SmolStr,
    occurrence: Option<usize>,
    target: Option<SymbolRef>,
    candidates: Vec<SymbolRef>,
    candidate_reason: Option<CandidateReason>,
    usage: ValueUsage,
    alias: Option<SymbolId>,
}

/// Fluent configuration of a declared symbol.
pub struct Declaration<'b, I> {
    draft: &'b mut SymbolDraft,
    id: I,
}

impl<I: Copy> Declaration<'_, I> {
    pub fn id(&self) -> I {
        self.id
    }

    pub fn accessibility(self, accessibility: Accessibility) -> Self {
        self.draft.accessibility = accessibility;
        self
    }

    pub fn modifiers(self, modifiers: Modifiers) -> Self {
        self.draft.modifiers = modifiers;
        self
    }

    pub fn sealed(self) -> Self {
        self.draft.modifiers.is_sealed = true;
        self
    }

    pub fn is_static(self) -> Self {
        self.draft.modifiers.is_static = true;
        self
    }

    pub fn is_virtual(self) -> Self {
        self.draft.modifiers.is_virtual = true;
        self
    }

    pub fn is_abstract(self) -> Self {
        self.draft.modifiers.is_abstract = true;
        self
    }

    /// Mark as `override` of `member`.
    pub fn overrides(self, member: impl Into<SymbolRef>) -> Self {
        self.draft.modifiers.is_override = true;
        self.draft.overridden = Some(member.into());
        self
    }

    pub fn base_type(self, base: impl Into<SymbolRef>) -> Self {
        self.draft.base_type = Some(base.into());
        self
    }

    pub fn implements(self, interface: impl Into<SymbolRef>) -> Self {
        self.draft.interfaces.push(interface.into());
        self
    }

    pub fn explicitly_implements(self, member: impl Into<SymbolRef>) -> Self {
        self.draft.explicit_implementations.push(member.into());
        self
    }

    /// Parameter list used in the symbol key, e.g. `(int)`.
    pub fn signature(self, signature: &str) -> Self {
        self.draft.signature = SmolStr::new(signature);
        self
    }

    /// Dotted namespace prefix used in the symbol key of a top-level type.
    pub fn namespace(self, namespace: &str) -> Self {
        self.draft.namespace = Some(SmolStr::new(namespace));
        self
    }

    /// Use the `n`-th (0-based) identifier occurrence of the name as the declaration site.
    pub fn occurrence(self, n: usize) -> Self {
        if let Some(site) = &mut self.draft.site {
            site.occurrence = n;
        }
        self
    }
}

/// Fluent configuration of a binding.
pub struct Binding<'b> {
    draft: &'b mut BindingDraft,
}

impl Binding<'_> {
    /// Bind only the `n`-th (0-based) non-declaration occurrence instead of all of them.
    pub fn occurrence(self, n: usize) -> Self {
        self.draft.occurrence = Some(n);
        self
    }

    pub fn usage(self, usage: ValueUsage) -> Self {
        self.draft.usage = usage;
        self
    }

    /// Record that the token reached its target through `alias`.
    pub fn via_alias(self, alias: SymbolId) -> Self {
        self.draft.alias = Some(alias);
        self
    }
}

/// Describes a solution and freezes it into a [`Solution`].
#[derive(Debug, Default)]
pub struct SolutionBuilder {
    projects: Vec<ProjectDraft>,
    documents: Vec<DocumentDraft>,
    symbols: Vec<SymbolDraft>,
    metadata: Vec<SymbolDraft>,
    assemblies: IndexMap<SmolStr, Vec<SmolStr>>,
    bindings: Vec<BindingDraft>,
}

impl SolutionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // PROJECTS
    // ========================================================================

    /// Add a C# project whose assembly is named after it.
    pub fn add_project(&mut self, name: &str) -> ProjectId {
        self.add_project_with_language(name, Language::CSharp)
    }

    pub fn add_project_with_language(&mut self, name: &str, language: Language) -> ProjectId {
        let id = ProjectId::new(self.projects.len() as u32);
        self.projects.push(ProjectDraft {
            name: SmolStr::new(name),
            assembly_name: SmolStr::new(name),
            language,
            project_references: Vec::new(),
            metadata_references: Vec::new(),
            internals_visible_to: Vec::new(),
            previous_submission: None,
            is_submission: false,
            global_aliases: Vec::new(),
            documents: Vec::new(),
        });
        id
    }

    /// Add an interactive submission continuing `previous`.
    pub fn add_submission(&mut self, name: &str, previous: Option<ProjectId>) -> ProjectId {
        let id = self.add_project(name);
        let draft = &mut self.projects[id.index() as usize];
        draft.is_submission = true;
        draft.previous_submission = previous;
        if let Some(previous) = previous {
            draft.project_references.push(previous);
        }
        id
    }

    pub fn set_assembly_name(&mut self, project: ProjectId, assembly_name: &str) {
        self.projects[project.index() as usize].assembly_name = SmolStr::new(assembly_name);
    }

    pub fn add_project_reference(&mut self, from: ProjectId, to: ProjectId) {
        self.projects[from.index() as usize].project_references.push(to);
    }

    /// Add an `[assembly: InternalsVisibleTo(argument)]` to `project`'s assembly.
    pub fn add_internals_visible_to(&mut self, project: ProjectId, argument: &str) {
        self.projects[project.index() as usize]
            .internals_visible_to
            .push(SmolStr::new(argument));
    }

    // ========================================================================
    // METADATA
    // ========================================================================

    pub fn add_metadata_assembly(&mut self, name: &str) {
        self.assemblies.entry(SmolStr::new(name)).or_default();
    }

    pub fn add_metadata_internals_visible_to(&mut self, assembly: &str, argument: &str) {
        self.assemblies
            .entry(SmolStr::new(assembly))
            .or_default()
            .push(SmolStr::new(argument));
    }

    pub fn add_metadata_reference(&mut self, project: ProjectId, assembly: &str) {
        self.projects[project.index() as usize]
            .metadata_references
            .push(SmolStr::new(assembly));
    }

    /// Declare a type in a metadata assembly; `qualified_name` is dotted (`Lib.IShape`).
    pub fn declare_metadata_type(
        &mut self,
        assembly: &str,
        qualified_name: &str,
        type_kind: TypeKind,
    ) -> Declaration<'_, MetadataSymbolId> {
        self.add_metadata_assembly(assembly);
        let (namespace, name) = match qualified_name.rsplit_once('.') {
            Some((ns, name)) => (Some(SmolStr::new(ns)), name),
            None => (None, qualified_name),
        };
        let mut draft = SymbolDraft::new(name, SymbolKind::Type);
        draft.type_kind = Some(type_kind);
        draft.namespace = namespace;
        draft.assembly = Some(SmolStr::new(assembly));
        self.push_metadata(draft)
    }

    pub fn declare_metadata_member(
        &mut self,
        container: MetadataSymbolId,
        name: &str,
        kind: SymbolKind,
    ) -> Declaration<'_, MetadataSymbolId> {
        let assembly = self.metadata[container.0 as usize].assembly.clone();
        let mut draft = SymbolDraft::new(name, kind);
        draft.container = Some(container.into());
        draft.assembly = assembly;
        let parent = MetadataSymbolId(self.metadata.len() as u32);
        self.metadata.push(draft.clone());
        for accessor in accessor_drafts(&draft, parent.into()) {
            self.metadata.push(accessor);
        }
        Declaration {
            draft: &mut self.metadata[parent.0 as usize],
            id: parent,
        }
    }

    fn push_metadata(&mut self, draft: SymbolDraft) -> Declaration<'_, MetadataSymbolId> {
        let id = MetadataSymbolId(self.metadata.len() as u32);
        self.metadata.push(draft);
        Declaration {
            draft: &mut self.metadata[id.0 as usize],
            id,
        }
    }

    // ========================================================================
    // DOCUMENTS AND SOURCE DECLARATIONS
    // ========================================================================

    pub fn add_document(&mut self, project: ProjectId, path: &str, text: &str) -> DocumentId {
        let id = DocumentId::new(self.documents.len() as u32);
        self.documents.push(DocumentDraft {
            project,
            path: SmolStr::new(path),
            text: Arc::from(text),
            linked_from: None,
        });
        self.projects[project.index() as usize].documents.push(id);
        id
    }

    /// Include `original`'s file in `project` as well. Its declarations and
    /// bindings are replicated into `project`'s compilation at build time.
    pub fn add_linked_document(&mut self, project: ProjectId, original: DocumentId) -> DocumentId {
        let mut root = original;
        while let Some(from) = self.documents[root.index() as usize].linked_from {
            root = from;
        }
        let source = self.documents[root.index() as usize].clone();
        let id = self.add_document(project, &source.path, &source.text);
        self.documents[id.index() as usize].linked_from = Some(root);
        id
    }

    pub fn declare_namespace(&mut self, document: DocumentId, name: &str) -> SymbolId {
        self.push_source(document, SymbolDraft::new(name, SymbolKind::Namespace))
            .id()
    }

    pub fn declare_type(
        &mut self,
        document: DocumentId,
        name: &str,
        type_kind: TypeKind,
    ) -> Declaration<'_, SymbolId> {
        let mut draft = SymbolDraft::new(name, SymbolKind::Type);
        draft.type_kind = Some(type_kind);
        self.push_source(document, draft)
    }

    /// Declare a member of `container` in the container's document.
    ///
    /// Properties get `get_`/`set_` accessors and events get `add_`/`remove_`
    /// accessors automatically.
    pub fn declare_member(
        &mut self,
        container: SymbolId,
        name: &str,
        kind: SymbolKind,
    ) -> Declaration<'_, SymbolId> {
        let document = self.source_document(container);
        let mut draft = SymbolDraft::new(name, kind);
        draft.container = Some(container.into());
        let id = SymbolId::new(self.symbols.len() as u32);
        draft.project = Some(self.documents[document.index() as usize].project);
        draft.site = Some(DeclSite {
            document,
            occurrence: 0,
        });
        let accessors = accessor_drafts(&draft, id.into());
        self.symbols.push(draft);
        self.symbols.extend(accessors);
        Declaration {
            draft: &mut self.symbols[id.index() as usize],
            id,
        }
    }

    /// Declare a constructor of `container`; its name token is the type name,
    /// so pick the occurrence with [`Declaration::occurrence`].
    pub fn declare_constructor(&mut self, container: SymbolId) -> Declaration<'_, SymbolId> {
        let name = self.symbols[container.index() as usize].name.clone();
        let document = self.source_document(container);
        let mut draft = SymbolDraft::new(&name, SymbolKind::Method);
        draft.method_kind = Some(MethodKind::Constructor);
        draft.container = Some(container.into());
        self.push_source(document, draft).occurrence(1)
    }

    pub fn declare_local(&mut self, document: DocumentId, name: &str) -> Declaration<'_, SymbolId> {
        let mut draft = SymbolDraft::new(name, SymbolKind::Local);
        draft.accessibility = Accessibility::Private;
        self.push_source(document, draft)
    }

    /// Declare `using name = target;` in `document`.
    pub fn declare_alias(
        &mut self,
        document: DocumentId,
        name: &str,
        target: impl Into<SymbolRef>,
    ) -> SymbolId {
        let mut draft = SymbolDraft::new(name, SymbolKind::Alias);
        draft.alias_target = Some(target.into());
        self.push_source(document, draft).id()
    }

    /// Declare `global using name = target;` in `document`, visible project-wide.
    pub fn declare_global_alias(
        &mut self,
        document: DocumentId,
        name: &str,
        target: impl Into<SymbolRef>,
    ) -> SymbolId {
        let alias = self.declare_alias(document, name, target);
        let project = self.documents[document.index() as usize].project;
        self.projects[project.index() as usize].global_aliases.push(alias);
        alias
    }

    /// A constructed or reduced form of `original` that call sites bind to.
    pub fn declare_constructed(&mut self, original: SymbolId, signature: &str) -> SymbolId {
        let mut draft = self.symbols[original.index() as usize].clone();
        draft.signature = SmolStr::new(signature);
        draft.original_definition = Some(original.into());
        draft.site = None;
        let id = SymbolId::new(self.symbols.len() as u32);
        self.symbols.push(draft);
        id
    }

    fn push_source(
        &mut self,
        document: DocumentId,
        mut draft: SymbolDraft,
    ) -> Declaration<'_, SymbolId> {
        draft.project = Some(self.documents[document.index() as usize].project);
        draft.site = Some(DeclSite {
            document,
            occurrence: 0,
        });
        let id = SymbolId::new(self.symbols.len() as u32);
        self.symbols.push(draft);
        Declaration {
            draft: &mut self.symbols[id.index() as usize],
            id,
        }
    }

    fn source_document(&self, symbol: SymbolId) -> DocumentId {
        let mut current = &self.symbols[symbol.index() as usize];
        loop {
            if let Some(site) = &current.site {
                return site.document;
            }
            match current.associated.or(current.original_definition) {
                Some(SymbolRef::Source(parent)) => current = &self.symbols[parent.index() as usize],
                _ => panic!("{symbol} has no source declaration"),
            }
        }
    }

    // ========================================================================
    // BINDINGS
    // ========================================================================

    /// Bind identifier tokens named `name` in `document` to `target`.
    ///
    /// Without [`Binding::occurrence`], every non-declaration occurrence is bound.
    pub fn bind(
        &mut self,
        document: DocumentId,
        name: &str,
        target: impl Into<SymbolRef>,
    ) -> Binding<'_> {
        self.push_binding(BindingDraft {
            document,
            name: SmolStr::new(name),
            occurrence: None,
            target: Some(target.into()),
            candidates: Vec::new(),
            candidate_reason: None,
            usage: ValueUsage::Read,
            alias: None,
        })
    }

    /// Bind tokens whose resolution failed to a candidate list.
    pub fn bind_candidates(
        &mut self,
        document: DocumentId,
        name: &str,
        reason: CandidateReason,
        candidates: impl IntoIterator<Item = SymbolRef>,
    ) -> Binding<'_> {
        self.push_binding(BindingDraft {
            document,
            name: SmolStr::new(name),
            occurrence: None,
            target: None,
            candidates: candidates.into_iter().collect(),
            candidate_reason: Some(reason),
            usage: ValueUsage::Read,
            alias: None,
        })
    }

    fn push_binding(&mut self, draft: BindingDraft) -> Binding<'_> {
        self.bindings.push(draft);
        let last = self.bindings.len() - 1;
        Binding {
            draft: &mut self.bindings[last],
        }
    }

    // ========================================================================
    // BUILD
    // ========================================================================

    /// Freeze the described solution.
    pub fn build(mut self) -> Result<Solution, BuildError> {
        self.replicate_linked_documents();

        let project_ids: Vec<ProjectId> =
            (0..self.projects.len() as u32).map(ProjectId::new).collect();
        let graph = DependencyGraph::new(
            project_ids
                .iter()
                .map(|&id| (id, self.projects[id.index() as usize].project_references.as_slice())),
        )
        .map_err(BuildError::CyclicReference)?;

        let documents = self.build_documents();
        let visible_assemblies = self.visible_assemblies(&graph)?;

        // Source symbols keep their ids; metadata instances follow.
        let mut instances: FxHashMap<(ProjectId, MetadataSymbolId), SymbolId> =
            FxHashMap::default();
        let mut instance_order = Vec::new();
        let mut next = self.symbols.len() as u32;
        for &project in &project_ids {
            for assembly in &visible_assemblies[&project] {
                for (idx, draft) in self.metadata.iter().enumerate() {
                    if draft.assembly.as_ref() == Some(assembly) {
                        let template = MetadataSymbolId(idx as u32);
                        instances.insert((project, template), SymbolId::new(next));
                        instance_order.push((project, template));
                        next += 1;
                    }
                }
            }
        }

        let resolver = RefResolver {
            instances: &instances,
            metadata: &self.metadata,
        };

        let source_keys = qualified_keys(&self.symbols);
        let metadata_keys = qualified_keys(&self.metadata);

        let mut symbols = Vec::with_capacity(next as usize);
        for (idx, draft) in self.symbols.iter().enumerate() {
            let id = SymbolId::new(idx as u32);
            let project = draft.project.unwrap_or(ProjectId::new(0));
            let locations = match &draft.site {
                Some(site) => {
                    let doc = &documents[site.document.index() as usize];
                    vec![SourceLocation {
                        document: site.document,
                        range: find_occurrence(doc, &draft.name, site.occurrence, None)?,
                    }]
                }
                None => Vec::new(),
            };
            let mut key = source_keys[idx].clone();
            if let (SymbolKind::Local, Some(location)) = (draft.kind, locations.first()) {
                key = SmolStr::new(format!(
                    "L:{}@{}:{}",
                    location.document.index(),
                    u32::from(location.range.start()),
                    draft.name
                ));
            }
            let assembly = match draft.kind {
                SymbolKind::Namespace => None,
                _ => Some(self.projects[project.index() as usize].assembly_name.clone()),
            };
            symbols.push(resolver.symbol_data(
                id,
                draft,
                key,
                SymbolOrigin::Source { project, locations },
                assembly,
                project,
            )?);
        }
        for &(project, template) in &instance_order {
            let draft = &self.metadata[template.0 as usize];
            symbols.push(resolver.symbol_data(
                instances[&(project, template)],
                draft,
                metadata_keys[template.0 as usize].clone(),
                SymbolOrigin::Metadata { compilation: project },
                draft.assembly.clone(),
                project,
            )?);
        }

        link_members_and_accessors(&mut symbols);

        let mut documents = documents;
        for symbol in &symbols {
            if symbol.associated_symbol.is_some() || symbol.original_definition.is_some() {
                continue;
            }
            for location in symbol.source_locations() {
                documents[location.document.index() as usize]
                    .declarations
                    .insert(location.range.start(), symbol.id);
            }
        }

        for binding in &self.bindings {
            let doc = &mut documents[binding.document.index() as usize];
            let compilation = doc.project;
            let resolve = |r: SymbolRef| resolver.resolve(r, compilation);
            let info = SymbolInfo {
                symbol: binding.target.map(&resolve).transpose()?,
                candidates: binding
                    .candidates
                    .iter()
                    .map(|&r| resolve(r))
                    .collect::<Result<_, _>>()?,
                candidate_reason: binding.candidate_reason,
                usage: binding.usage,
            };
            let ranges = match binding.occurrence {
                Some(n) => vec![find_occurrence(doc, &binding.name, n, Some(&doc.declarations))?],
                None => {
                    let all = occurrences(doc, &binding.name, Some(&doc.declarations));
                    if all.is_empty() {
                        return Err(BuildError::OccurrenceNotFound {
                            document: binding.document,
                            name: binding.name.clone(),
                            occurrence: 0,
                        });
                    }
                    all
                }
            };
            for range in ranges {
                doc.bindings.insert(range.start(), info.clone());
                if let Some(alias) = binding.alias {
                    doc.alias_bindings.insert(range.start(), alias);
                }
            }
        }

        let mut metadata_instances = FxHashMap::default();
        let mut source_symbols = FxHashMap::default();
        for symbol in &symbols {
            let entry = (symbol.compilation(), symbol.key.clone());
            match symbol.origin {
                SymbolOrigin::Source { .. } if symbol.original_definition.is_none() => {
                    source_symbols.entry(entry).or_insert(symbol.id);
                }
                SymbolOrigin::Metadata { .. } => {
                    metadata_instances.insert(entry, symbol.id);
                }
                SymbolOrigin::Source { .. } => {}
            }
        }

        let mut documents_by_path: FxHashMap<SmolStr, Vec<DocumentId>> = FxHashMap::default();
        for doc in &documents {
            documents_by_path.entry(doc.path.clone()).or_default().push(doc.id);
        }

        let mut assemblies: FxHashMap<SmolStr, AssemblyInfo> = self
            .assemblies
            .iter()
            .map(|(name, ivt)| {
                (
                    name.clone(),
                    AssemblyInfo {
                        name: name.clone(),
                        internals_visible_to: ivt.clone(),
                    },
                )
            })
            .collect();
        let mut projects = IndexMap::new();
        for (idx, draft) in self.projects.into_iter().enumerate() {
            let id = ProjectId::new(idx as u32);
            assemblies.insert(
                draft.assembly_name.clone(),
                AssemblyInfo {
                    name: draft.assembly_name.clone(),
                    internals_visible_to: draft.internals_visible_to,
                },
            );
            projects.insert(
                id,
                Project {
                    id,
                    name: draft.name,
                    assembly_name: draft.assembly_name,
                    language: draft.language,
                    project_references: draft.project_references,
                    metadata_references: draft.metadata_references,
                    documents: draft.documents,
                    previous_submission: draft.previous_submission,
                    is_submission: draft.is_submission,
                    global_aliases: draft.global_aliases,
                },
            );
        }

        let solution = Solution(Arc::new(SolutionData {
            id: SolutionId::new(),
            projects,
            documents,
            symbols,
            graph,
            assemblies,
            metadata_instances,
            source_symbols,
            documents_by_path,
            visible_assemblies,
        }));
        tracing::debug!(?solution, "built solution snapshot");
        Ok(solution)
    }

    /// Copy declarations and bindings of linked originals into each linked document.
    fn replicate_linked_documents(&mut self) {
        for doc_idx in 0..self.documents.len() {
            let Some(original) = self.documents[doc_idx].linked_from else {
                continue;
            };
            let linked = DocumentId::new(doc_idx as u32);
            let project = self.documents[doc_idx].project;

            let mut clones: FxHashMap<SymbolId, SymbolId> = FxHashMap::default();
            let mut next = self.symbols.len() as u32;
            for (idx, draft) in self.symbols.iter().enumerate() {
                let declared_here = draft.site.as_ref().is_some_and(|s| s.document == original);
                let accessor_of_clone = draft.site.is_none()
                    && matches!(
                        draft.associated,
                        Some(SymbolRef::Source(p)) if clones.contains_key(&p)
                    );
                if declared_here || accessor_of_clone {
                    clones.insert(SymbolId::new(idx as u32), SymbolId::new(next));
                    next += 1;
                }
            }

            let remap = |r: SymbolRef| match r {
                SymbolRef::Source(id) => SymbolRef::Source(clones.get(&id).copied().unwrap_or(id)),
                other => other,
            };
            let mut ordered: Vec<(SymbolId, SymbolId)> =
                clones.iter().map(|(&a, &b)| (a, b)).collect();
            ordered.sort_by_key(|&(_, clone)| clone);
            let mut new_drafts = Vec::with_capacity(ordered.len());
            for (source, _) in ordered {
                let mut draft = self.symbols[source.index() as usize].clone();
                draft.project = Some(project);
                if let Some(site) = &mut draft.site {
                    site.document = linked;
                }
                draft.container = draft.container.map(remap);
                draft.base_type = draft.base_type.map(remap);
                draft.interfaces = draft.interfaces.into_iter().map(remap).collect();
                draft.overridden = draft.overridden.map(remap);
                draft.explicit_implementations =
                    draft.explicit_implementations.into_iter().map(remap).collect();
                draft.associated = draft.associated.map(remap);
                draft.alias_target = draft.alias_target.map(remap);
                new_drafts.push(draft);
            }
            self.symbols.extend(new_drafts);

            let bindings: Vec<BindingDraft> = self
                .bindings
                .iter()
                .filter(|b| b.document == original)
                .map(|b| BindingDraft {
                    document: linked,
                    target: b.target.map(remap),
                    candidates: b.candidates.iter().copied().map(remap).collect(),
                    alias: b.alias.map(|a| clones.get(&a).copied().unwrap_or(a)),
                    ..b.clone()
                })
                .collect();
            self.bindings.extend(bindings);
        }
    }

    fn build_documents(&self) -> Vec<Document> {
        self.documents
            .iter()
            .enumerate()
            .map(|(idx, draft)| {
                let language = self.projects[draft.project.index() as usize].language;
                let syntax = SyntaxTree::parse(&draft.text, language);
                let index = SyntaxTreeIndex::new(&syntax, language.is_case_sensitive());
                Document {
                    id: DocumentId::new(idx as u32),
                    project: draft.project,
                    path: draft.path.clone(),
                    line_index: LineIndex::new(&draft.text),
                    text: draft.text.clone(),
                    syntax,
                    index,
                    bindings: FxHashMap::default(),
                    alias_bindings: FxHashMap::default(),
                    declarations: FxHashMap::default(),
                }
            })
            .collect()
    }

    fn visible_assemblies(
        &self,
        graph: &DependencyGraph,
    ) -> Result<FxHashMap<ProjectId, Vec<SmolStr>>, BuildError> {
        let mut visible = FxHashMap::default();
        for idx in 0..self.projects.len() {
            let project = ProjectId::new(idx as u32);
            let mut names: Vec<SmolStr> = Vec::new();
            let sources = std::iter::once(project).chain(graph.transitive_dependencies(project));
            for source in sources {
                for name in &self.projects[source.index() as usize].metadata_references {
                    if !self.assemblies.contains_key(name) {
                        return Err(BuildError::UnknownAssembly(name.clone()));
                    }
                    if !names.contains(name) {
                        names.push(name.clone());
                    }
                }
            }
            // Stable instance numbering regardless of hash-set iteration order.
            names.sort_by_key(|n| self.assemblies.get_index_of(n));
            visible.insert(project, names);
        }
        Ok(visible)
    }
}

/// Accessor drafts for a property or event draft.
fn accessor_drafts(parent: &SymbolDraft, parent_ref: SymbolRef) -> Vec<SymbolDraft> {
    let kinds: &[MethodKind] = match parent.kind {
        SymbolKind::Property => &[MethodKind::PropertyGet, MethodKind::PropertySet],
        SymbolKind::Event => &[MethodKind::EventAdd, MethodKind::EventRemove],
        _ => &[],
    };
    kinds
        .iter()
        .map(|&method_kind| {
            let prefix = method_kind.accessor_prefix().unwrap_or_default();
            let name = format!("{prefix}{}", parent.name);
            let mut draft = SymbolDraft::new(&name, SymbolKind::Method);
            draft.method_kind = Some(method_kind);
            draft.container = parent.container;
            draft.associated = Some(parent_ref);
            draft.project = parent.project;
            draft.assembly = parent.assembly.clone();
            draft
        })
        .collect()
}

/// Keys for every draft in `drafts`, computed through the container chain.
fn qualified_keys(drafts: &[SymbolDraft]) -> Vec<SmolStr> {
    fn qualified(drafts: &[SymbolDraft], idx: usize, memo: &mut Vec<Option<SmolStr>>) -> SmolStr {
        if let Some(name) = &memo[idx] {
            return name.clone();
        }
        let draft = &drafts[idx];
        let prefix = match draft.container {
            Some(SymbolRef::Source(c)) => Some(qualified(drafts, c.index() as usize, memo)),
            Some(SymbolRef::Metadata(c)) => Some(qualified(drafts, c.0 as usize, memo)),
            None => draft.namespace.clone(),
        };
        let name = match prefix {
            Some(prefix) => SmolStr::new(format!("{prefix}.{}", draft.name)),
            None => draft.name.clone(),
        };
        memo[idx] = Some(name.clone());
        name
    }

    let mut memo = vec![None; drafts.len()];
    (0..drafts.len())
        .map(|idx| {
            let draft = &drafts[idx];
            let path = qualified(drafts, idx, &mut memo);
            let mut key = format!("{}{path}{}", draft.kind.key_prefix(), draft.signature);
            if draft.original_definition.is_some() {
                key.push_str("{constructed}");
            }
            SmolStr::new(key)
        })
        .collect()
}

struct RefResolver<'a> {
    instances: &'a FxHashMap<(ProjectId, MetadataSymbolId), SymbolId>,
    metadata: &'a [SymbolDraft],
}

impl RefResolver<'_> {
    fn resolve(&self, r: SymbolRef, compilation: ProjectId) -> Result<SymbolId, BuildError> {
        match r {
            SymbolRef::Source(id) => Ok(id),
            SymbolRef::Metadata(m) => self.instances.get(&(compilation, m)).copied().ok_or_else(|| {
                BuildError::AssemblyNotVisible {
                    project: compilation,
                    assembly: self.metadata[m.0 as usize].assembly.clone().unwrap_or_default(),
                }
            }),
        }
    }

    fn resolve_opt(
        &self,
        r: Option<SymbolRef>,
        compilation: ProjectId,
    ) -> Result<Option<SymbolId>, BuildError> {
        r.map(|r| self.resolve(r, compilation)).transpose()
    }

    fn resolve_all(
        &self,
        refs: &[SymbolRef],
        compilation: ProjectId,
    ) -> Result<Vec<SymbolId>, BuildError> {
        refs.iter().map(|&r| self.resolve(r, compilation)).collect()
    }

    fn symbol_data(
        &self,
        id: SymbolId,
        draft: &SymbolDraft,
        key: SmolStr,
        origin: SymbolOrigin,
        containing_assembly: Option<SmolStr>,
        compilation: ProjectId,
    ) -> Result<SymbolData, BuildError> {
        Ok(SymbolData {
            id,
            name: draft.name.clone(),
            key,
            kind: draft.kind,
            type_kind: draft.type_kind,
            method_kind: draft.method_kind,
            accessibility: draft.accessibility,
            modifiers: draft.modifiers,
            origin,
            containing_assembly,
            container: self.resolve_opt(draft.container, compilation)?,
            signature: draft.signature.clone(),
            base_type: self.resolve_opt(draft.base_type, compilation)?,
            interfaces: self.resolve_all(&draft.interfaces, compilation)?,
            members: Vec::new(),
            overridden: self.resolve_opt(draft.overridden, compilation)?,
            explicit_implementations: self
                .resolve_all(&draft.explicit_implementations, compilation)?,
            associated_symbol: self.resolve_opt(draft.associated, compilation)?,
            accessors: Vec::new(),
            alias_target: self.resolve_opt(draft.alias_target, compilation)?,
            original_definition: self.resolve_opt(draft.original_definition, compilation)?,
        })
    }
}

/// Fill member and accessor lists, and derive accessor inheritance from
/// their property or event.
fn link_members_and_accessors(symbols: &mut [SymbolData]) {
    for idx in 0..symbols.len() {
        let id = symbols[idx].id;
        if symbols[idx].original_definition.is_some() {
            continue;
        }
        if let Some(container) = symbols[idx].container {
            symbols[container.index() as usize].members.push(id);
        }
        if let Some(owner) = symbols[idx].associated_symbol {
            symbols[owner.index() as usize].accessors.push(id);
        }
    }

    let accessor_of = |symbols: &[SymbolData], owner: SymbolId, kind: Option<MethodKind>| {
        symbols[owner.index() as usize]
            .accessors
            .iter()
            .copied()
            .find(|&a| symbols[a.index() as usize].method_kind == kind)
    };

    for idx in 0..symbols.len() {
        let Some(owner) = symbols[idx].associated_symbol else {
            continue;
        };
        let kind = symbols[idx].method_kind;
        let owner_data = &symbols[owner.index() as usize];
        let origin = owner_data.origin.clone();
        let modifiers = owner_data.modifiers;
        let accessibility = owner_data.accessibility;
        let overridden = owner_data
            .overridden
            .and_then(|o| accessor_of(symbols, o, kind));
        let explicit: Vec<SymbolId> = owner_data
            .explicit_implementations
            .iter()
            .filter_map(|&e| accessor_of(symbols, e, kind))
            .collect();

        let accessor = &mut symbols[idx];
        accessor.origin = origin;
        accessor.modifiers = modifiers;
        accessor.accessibility = accessibility;
        accessor.overridden = overridden;
        accessor.explicit_implementations = explicit;
    }
}

fn names_match(token: &str, name: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        token == name
    } else {
        fold_case(token, false) == fold_case(name, false)
    }
}

/// Ranges of tokens named `name`, skipping declaration sites when given.
///
/// Keyword tokens are matched too, so `new` in `Widget w = new();` can be bound.
fn occurrences(
    doc: &Document,
    name: &str,
    skip: Option<&FxHashMap<TextSize, SymbolId>>,
) -> Vec<TextRange> {
    doc.syntax
        .tokens()
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::Identifier | TokenKind::Keyword))
        .filter(|t| names_match(&t.value_text, name, doc.index.is_case_sensitive()))
        .filter(|t| skip.is_none_or(|decls| !decls.contains_key(&t.start())))
        .map(|t| t.range)
        .collect()
}

fn find_occurrence(
    doc: &Document,
    name: &str,
    n: usize,
    skip: Option<&FxHashMap<TextSize, SymbolId>>,
) -> Result<TextRange, BuildError> {
    occurrences(doc, name, skip)
        .get(n)
        .copied()
        .ok_or_else(|| BuildError::OccurrenceNotFound {
            document: doc.id,
            name: SmolStr::new(name),
            occurrence: n,
        })
}
