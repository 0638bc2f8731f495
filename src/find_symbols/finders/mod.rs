//! Per-kind reference finders.
//!
//! Each [`ReferenceFinder`] knows how one kind of symbol is spelled in
//! source: which related symbols must be searched with it, which documents
//! could mention it, and which tokens in a document refer to it. Finders are
//! invoked uniformly for every symbol; a finder that does not apply to a
//! symbol returns nothing.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::base::{DocumentId, ProjectId, SymbolId, TextSize};
use crate::error::{Result, check_cancelled};
use crate::hir::{Document, MethodKind, Solution, SymbolData, SymbolInfo, SymbolKind, ValueUsage};
use crate::syntax::{SyntaxToken, TokenKind};

use super::document_cache::FindReferenceCache;
use super::equivalence::symbols_equivalent;
use super::progress::ReferenceLocation;
use super::symbol_set::SearchContext;

const ATTRIBUTE_SUFFIX: &str = "Attribute";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceFinder {
    Namespace,
    NamedType,
    Constructor,
    Method,
    Property,
    PropertyAccessor,
    Event,
    Field,
    Local,
}

impl ReferenceFinder {
    pub const ALL: [ReferenceFinder; 9] = [
        ReferenceFinder::Namespace,
        ReferenceFinder::NamedType,
        ReferenceFinder::Constructor,
        ReferenceFinder::Method,
        ReferenceFinder::Property,
        ReferenceFinder::PropertyAccessor,
        ReferenceFinder::Event,
        ReferenceFinder::Field,
        ReferenceFinder::Local,
    ];

    pub fn applies_to(self, data: &SymbolData) -> bool {
        match self {
            ReferenceFinder::Namespace => data.kind == SymbolKind::Namespace,
            ReferenceFinder::NamedType => data.kind == SymbolKind::Type,
            ReferenceFinder::Constructor => data.is_constructor(),
            ReferenceFinder::Method => {
                data.kind == SymbolKind::Method
                    && !data.is_constructor()
                    && !data.is_property_accessor()
            }
            ReferenceFinder::Property => data.kind == SymbolKind::Property,
            ReferenceFinder::PropertyAccessor => data.is_property_accessor(),
            ReferenceFinder::Event => data.kind == SymbolKind::Event,
            ReferenceFinder::Field => data.kind == SymbolKind::Field,
            ReferenceFinder::Local => data.kind == SymbolKind::Local,
        }
    }

    /// Symbols that must be searched whenever `symbol` is.
    pub fn determine_cascaded_symbols(
        self,
        ctx: &SearchContext<'_>,
        symbol: SymbolId,
    ) -> Vec<SymbolId> {
        let solution = ctx.solution;
        let data = solution.symbol(symbol);
        if !self.applies_to(data) {
            return Vec::new();
        }
        match self {
            ReferenceFinder::NamedType => data
                .members
                .iter()
                .copied()
                .filter(|&m| solution.symbol(m).is_constructor())
                .collect(),
            ReferenceFinder::Property | ReferenceFinder::Event => data.accessors.clone(),
            ReferenceFinder::PropertyAccessor
                if !ctx.options.associate_property_references_with_specific_accessor =>
            {
                data.associated_symbol.into_iter().collect()
            }
            // Event accessors are always searched with their event.
            ReferenceFinder::Method => data.associated_symbol.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Documents of `project` that could mention `symbol`.
    pub fn determine_documents_to_search(
        self,
        ctx: &SearchContext<'_>,
        symbol: SymbolId,
        project: ProjectId,
        scope: Option<&FxHashSet<DocumentId>>,
    ) -> Result<Vec<DocumentId>> {
        check_cancelled(ctx.cancel)?;
        let solution = ctx.solution;
        let data = solution.symbol(symbol);
        if !self.applies_to(data) {
            return Ok(Vec::new());
        }
        let Some(project) = solution.project(project) else {
            return Ok(Vec::new());
        };
        let in_scope = |d: &DocumentId| scope.is_none_or(|s| s.contains(d));

        if self == ReferenceFinder::Local {
            let mut documents: Vec<DocumentId> = data
                .source_locations()
                .iter()
                .map(|l| l.document)
                .filter(|d| project.documents.contains(d))
                .filter(in_scope)
                .collect();
            documents.dedup();
            return Ok(documents);
        }

        let mut names = self.search_names(solution, symbol);
        names.extend(
            self.determine_global_aliases(ctx, symbol, project.id)
                .into_iter()
                .map(|alias| solution.symbol(alias).name.clone()),
        );
        let implicit_creation = self == ReferenceFinder::Constructor;

        let documents = project
            .documents
            .iter()
            .copied()
            .filter(in_scope)
            .filter(|&d| {
                let Some(document) = solution.document(d) else {
                    return false;
                };
                let index = &document.index;
                names.iter().any(|n| index.probably_contains_identifier(n))
                    || (implicit_creation && index.contains_implicit_object_creation())
            })
            .collect();
        Ok(documents)
    }

    /// Tokens of the cached document that refer to `symbol`.
    pub fn find_references_in_document(
        self,
        ctx: &SearchContext<'_>,
        symbol: SymbolId,
        cache: &FindReferenceCache<'_>,
    ) -> Result<Vec<ReferenceLocation>> {
        check_cancelled(ctx.cancel)?;
        let solution = ctx.solution;
        let data = solution.symbol(symbol);
        if !self.applies_to(data) {
            return Ok(Vec::new());
        }
        let document = cache.model().document();

        let mut names = self.search_names(solution, symbol);
        names.extend(self.alias_names_in(ctx, symbol, document));

        let mut seen: FxHashSet<TextSize> = FxHashSet::default();
        let mut locations = Vec::new();
        for name in &names {
            for token in cache.find_matching_identifier_tokens(name).iter() {
                if !seen.insert(token.start()) {
                    continue;
                }
                let info = cache.symbol_info(token);
                let matched = self.match_token(ctx, symbol, document, token, &info, cache);
                locations.extend(matched);
            }
        }

        if self == ReferenceFinder::Constructor
            && document.index.contains_implicit_object_creation()
        {
            locations.extend(implicit_object_creations(ctx, symbol, document, cache));
        }

        locations.sort_by_key(|l| l.range.start());
        Ok(locations)
    }

    /// Project-wide aliases of `project` whose target is `symbol`.
    pub fn determine_global_aliases(
        self,
        ctx: &SearchContext<'_>,
        symbol: SymbolId,
        project: ProjectId,
    ) -> Vec<SymbolId> {
        let solution = ctx.solution;
        if !matches!(self, ReferenceFinder::NamedType | ReferenceFinder::Namespace) {
            return Vec::new();
        }
        if !self.applies_to(solution.symbol(symbol)) {
            return Vec::new();
        }
        let Some(project) = solution.project(project) else {
            return Vec::new();
        };
        project
            .global_aliases
            .iter()
            .copied()
            .filter(|&alias| {
                solution
                    .symbol(alias)
                    .alias_target
                    .is_some_and(|target| symbols_match(solution, target, symbol))
            })
            .collect()
    }

    /// Names under which `symbol` can be written, not counting aliases.
    fn search_names(self, solution: &Solution, symbol: SymbolId) -> Vec<SmolStr> {
        let data = solution.symbol(symbol);
        let mut names = Vec::new();
        match self {
            ReferenceFinder::Constructor => {
                if let Some(container) = data.container {
                    push_type_names(&mut names, &solution.symbol(container).name);
                }
            }
            ReferenceFinder::NamedType => push_type_names(&mut names, &data.name),
            ReferenceFinder::PropertyAccessor => {
                if let Some(owner) = data.associated_symbol {
                    names.push(solution.symbol(owner).name.clone());
                }
                names.push(data.name.clone());
            }
            _ => names.push(data.name.clone()),
        }
        names.retain(|n| !n.is_empty());
        names
    }

    /// Names of aliases that may stand for `symbol` in `document`: its own
    /// `using` aliases and its project's global aliases.
    fn alias_names_in(
        self,
        ctx: &SearchContext<'_>,
        symbol: SymbolId,
        document: &Document,
    ) -> Vec<SmolStr> {
        if !matches!(self, ReferenceFinder::NamedType | ReferenceFinder::Namespace) {
            return Vec::new();
        }
        let solution = ctx.solution;
        let mut local: Vec<SymbolId> = solution
            .declared_symbols(document.id)
            .filter(|&s| {
                let alias = solution.symbol(s);
                alias.kind == SymbolKind::Alias
                    && alias
                        .alias_target
                        .is_some_and(|target| symbols_match(solution, target, symbol))
            })
            .collect();
        local.sort_unstable();
        local
            .into_iter()
            .chain(self.determine_global_aliases(ctx, symbol, document.project))
            .map(|alias| solution.symbol(alias).name.clone())
            .collect()
    }

    fn match_token(
        self,
        ctx: &SearchContext<'_>,
        symbol: SymbolId,
        document: &Document,
        token: &SyntaxToken,
        info: &SymbolInfo,
        cache: &FindReferenceCache<'_>,
    ) -> Option<ReferenceLocation> {
        let solution = ctx.solution;
        let associate = ctx.options.associate_property_references_with_specific_accessor;
        let location = |candidate_reason| ReferenceLocation {
            document: document.id,
            range: token.range,
            alias: cache.alias_info(token),
            is_implicit: false,
            candidate_reason,
            usage: info.usage,
        };

        match info.symbol {
            Some(bound) => {
                if symbols_match(solution, bound, symbol) {
                    if self == ReferenceFinder::Property
                        && associate
                        && routed_to_accessor(solution, symbol, info.usage)
                    {
                        return None;
                    }
                    return Some(location(None));
                }
                if self == ReferenceFinder::PropertyAccessor && associate {
                    let data = solution.symbol(symbol);
                    let routed = data.associated_symbol.is_some_and(|owner| {
                        symbols_match(solution, bound, owner)
                            && data.method_kind.is_some_and(|k| accessor_takes(k, info.usage))
                    });
                    if routed {
                        return Some(location(None));
                    }
                }
                None
            }
            None => info
                .candidates
                .iter()
                .any(|&c| symbols_match(solution, c, symbol))
                .then(|| location(info.candidate_reason)),
        }
    }
}

/// Whether the bound symbol `candidate` refers to the searched `symbol`.
///
/// Constructed and reduced forms are compared through their original
/// definition, and delegate constructors count as their delegate type.
/// Metadata instances of an assembly built in the solution compare as the
/// source declaration they were compiled from.
pub(crate) fn symbols_match(solution: &Solution, candidate: SymbolId, symbol: SymbolId) -> bool {
    let candidate = source_or_self(solution, canonical_symbol(solution, candidate));
    symbols_equivalent(solution, candidate, source_or_self(solution, symbol))
}

fn source_or_self(solution: &Solution, symbol: SymbolId) -> SymbolId {
    solution.find_source_definition(symbol).unwrap_or(symbol)
}

/// The original definition of `symbol`; a delegate's constructor maps to
/// the delegate type.
pub(crate) fn canonical_symbol(solution: &Solution, symbol: SymbolId) -> SymbolId {
    let mut current = symbol;
    let mut steps = 0;
    while let Some(original) = solution.symbol(current).original_definition {
        current = original;
        steps += 1;
        if steps > solution.symbol_count() {
            break;
        }
    }
    let data = solution.symbol(current);
    if data.is_constructor() {
        if let Some(container) = data.container {
            if solution.symbol(container).is_delegate() {
                return container;
            }
        }
    }
    current
}

fn push_type_names(names: &mut Vec<SmolStr>, name: &SmolStr) {
    names.push(name.clone());
    if let Some(short) = name.strip_suffix(ATTRIBUTE_SUFFIX) {
        if !short.is_empty() {
            names.push(SmolStr::new(short));
        }
    }
}

/// Whether an accessor of kind `kind` takes a property use of `usage`.
fn accessor_takes(kind: MethodKind, usage: ValueUsage) -> bool {
    match kind {
        MethodKind::PropertyGet => usage.is_read(),
        MethodKind::PropertySet => usage.is_write(),
        _ => false,
    }
}

/// Whether a use of `property` is reported against one of its accessors.
fn routed_to_accessor(solution: &Solution, property: SymbolId, usage: ValueUsage) -> bool {
    solution
        .symbol(property)
        .accessors
        .iter()
        .filter_map(|&a| solution.symbol(a).method_kind)
        .any(|k| accessor_takes(k, usage))
}

/// Target-typed `new(...)` expressions bound to the constructor `symbol`.
fn implicit_object_creations(
    ctx: &SearchContext<'_>,
    symbol: SymbolId,
    document: &Document,
    cache: &FindReferenceCache<'_>,
) -> Vec<ReferenceLocation> {
    let tree = &document.syntax;
    tree.tokens()
        .iter()
        .filter(|t| t.kind == TokenKind::Keyword && t.value_text == "new" && !t.in_trivia)
        .filter(|t| tree.next_token(t).is_some_and(|next| next.value_text == "("))
        .filter_map(|token| {
            let info = cache.symbol_info(token);
            let bound = info.symbol?;
            symbols_match(ctx.solution, bound, symbol).then(|| ReferenceLocation {
                document: document.id,
                range: token.range,
                alias: None,
                is_implicit: true,
                candidate_reason: None,
                usage: info.usage,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::find_symbols::{FindReferencesSearchOptions, SymbolFinder};
    use crate::hir::{CandidateReason, SolutionBuilder, TypeKind};

    fn context<'a>(
        finder: &'a SymbolFinder,
        solution: &'a Solution,
        options: FindReferencesSearchOptions,
        cancel: &'a CancellationToken,
    ) -> SearchContext<'a> {
        SearchContext {
            finder,
            solution,
            options,
            cancel,
        }
    }

    fn offsets(locations: &[ReferenceLocation]) -> Vec<u32> {
        locations.iter().map(|l| u32::from(l.range.start())).collect()
    }

    #[test]
    fn test_finders_apply_to_their_kind_only() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(p, "A.cs", "class A { int Size { get; set; } A() {} }");
        let a = b.declare_type(d, "A", TypeKind::Class).id();
        let size = b.declare_member(a, "Size", SymbolKind::Property).id();
        let ctor = b.declare_constructor(a).id();
        let solution = b.build().unwrap();

        let applicable = |s: SymbolId| -> Vec<ReferenceFinder> {
            ReferenceFinder::ALL
                .into_iter()
                .filter(|f| f.applies_to(solution.symbol(s)))
                .collect()
        };
        assert_eq!(applicable(a), vec![ReferenceFinder::NamedType]);
        assert_eq!(applicable(size), vec![ReferenceFinder::Property]);
        assert_eq!(applicable(ctor), vec![ReferenceFinder::Constructor]);
        let getter = solution.symbol(size).accessors[0];
        assert_eq!(applicable(getter), vec![ReferenceFinder::PropertyAccessor]);
    }

    #[test]
    fn test_cascades() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(p, "A.cs", "class A { A() {} int Size { get; } }");
        let a = b.declare_type(d, "A", TypeKind::Class).id();
        let ctor = b.declare_constructor(a).id();
        let size = b.declare_member(a, "Size", SymbolKind::Property).id();
        let solution = b.build().unwrap();

        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let ctx = context(&finder, &solution, FindReferencesSearchOptions::default(), &cancel);
        let getter = solution.symbol(size).accessors[0];

        assert_eq!(ReferenceFinder::NamedType.determine_cascaded_symbols(&ctx, a), vec![ctor]);
        assert_eq!(
            ReferenceFinder::Property.determine_cascaded_symbols(&ctx, size),
            solution.symbol(size).accessors
        );
        assert_eq!(
            ReferenceFinder::PropertyAccessor.determine_cascaded_symbols(&ctx, getter),
            vec![size]
        );

        let routed = context(
            &finder,
            &solution,
            FindReferencesSearchOptions::default()
                .with_associate_property_references_with_specific_accessor(true),
            &cancel,
        );
        assert!(ReferenceFinder::PropertyAccessor
            .determine_cascaded_symbols(&routed, getter)
            .is_empty());
        assert!(ReferenceFinder::Method.determine_cascaded_symbols(&ctx, a).is_empty());
    }

    #[test]
    fn test_documents_filtered_by_identifier_text() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d1 = b.add_document(p, "Obsolete.cs", "class ObsoleteAttribute {}");
        let d2 = b.add_document(p, "Use.cs", "[Obsolete] class X {}");
        let d3 = b.add_document(p, "Other.cs", "class Y {}");
        let attr = b.declare_type(d1, "ObsoleteAttribute", TypeKind::Class).id();
        b.bind(d2, "Obsolete", attr);
        let solution = b.build().unwrap();

        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let ctx = context(&finder, &solution, FindReferencesSearchOptions::default(), &cancel);
        let docs = ReferenceFinder::NamedType
            .determine_documents_to_search(&ctx, attr, p, None)
            .unwrap();
        assert_eq!(docs, vec![d1, d2]);
        assert!(!docs.contains(&d3));

        let scope: FxHashSet<DocumentId> = [d2].into_iter().collect();
        let scoped = ReferenceFinder::NamedType
            .determine_documents_to_search(&ctx, attr, p, Some(&scope))
            .unwrap();
        assert_eq!(scoped, vec![d2]);

        let cache = FindReferenceCache::new(solution.semantic_model(d2).unwrap());
        let found = ReferenceFinder::NamedType
            .find_references_in_document(&ctx, attr, &cache)
            .unwrap();
        assert_eq!(offsets(&found), vec![1]);
    }

    #[test]
    fn test_property_references_route_to_accessors() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(
            p,
            "A.cs",
            "class A { int Size { get; set; } \
             void M() { Size = Size + 1; Size++; nameof(Size); } }",
        );
        let a = b.declare_type(d, "A", TypeKind::Class).id();
        let size = b.declare_member(a, "Size", SymbolKind::Property).id();
        b.bind(d, "Size", size).occurrence(0).usage(ValueUsage::Write);
        b.bind(d, "Size", size).occurrence(1).usage(ValueUsage::Read);
        b.bind(d, "Size", size).occurrence(2).usage(ValueUsage::ReadWrite);
        b.bind(d, "Size", size).occurrence(3).usage(ValueUsage::Name);
        let solution = b.build().unwrap();
        let getter = solution.symbol(size).accessors[0];
        let setter = solution.symbol(size).accessors[1];

        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let cache = FindReferenceCache::new(solution.semantic_model(d).unwrap());

        let plain = context(&finder, &solution, FindReferencesSearchOptions::default(), &cancel);
        let all = ReferenceFinder::Property
            .find_references_in_document(&plain, size, &cache)
            .unwrap();
        assert_eq!(all.len(), 4);
        assert!(ReferenceFinder::PropertyAccessor
            .find_references_in_document(&plain, getter, &cache)
            .unwrap()
            .is_empty());

        let routed = context(
            &finder,
            &solution,
            FindReferencesSearchOptions::default()
                .with_associate_property_references_with_specific_accessor(true),
            &cancel,
        );
        let property = ReferenceFinder::Property
            .find_references_in_document(&routed, size, &cache)
            .unwrap();
        assert_eq!(property.len(), 1);
        assert_eq!(property[0].usage, ValueUsage::Name);

        let reads = ReferenceFinder::PropertyAccessor
            .find_references_in_document(&routed, getter, &cache)
            .unwrap();
        let writes = ReferenceFinder::PropertyAccessor
            .find_references_in_document(&routed, setter, &cache)
            .unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(writes.len(), 2);
        assert_eq!(reads[1].range, writes[1].range, "Size++ is both");
    }

    #[test]
    fn test_candidates_aliases_and_implicit_creation() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(
            p,
            "A.cs",
            "using G = Gear; class Gear { Gear() {} } \
             class X { G g = new(); void F() { Spin(); } void Spin() {} }",
        );
        let gear = b.declare_type(d, "Gear", TypeKind::Class).occurrence(1).id();
        let ctor = b.declare_constructor(gear).occurrence(2).id();
        let alias = b.declare_alias(d, "G", gear);
        b.bind(d, "G", gear).via_alias(alias);
        b.bind(d, "Gear", gear);
        b.bind(d, "new", ctor);
        let x = b.declare_type(d, "X", TypeKind::Class).id();
        let spin = b.declare_member(x, "Spin", SymbolKind::Method).occurrence(1).id();
        b.bind_candidates(d, "Spin", CandidateReason::OverloadResolutionFailure, [spin.into()]);
        let solution = b.build().unwrap();

        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let ctx = context(&finder, &solution, FindReferencesSearchOptions::default(), &cancel);
        let cache = FindReferenceCache::new(solution.semantic_model(d).unwrap());

        let types = ReferenceFinder::NamedType
            .find_references_in_document(&ctx, gear, &cache)
            .unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(types[1].alias, Some(alias));

        let ctors = ReferenceFinder::Constructor
            .find_references_in_document(&ctx, ctor, &cache)
            .unwrap();
        assert_eq!(ctors.len(), 1);
        assert!(ctors[0].is_implicit);

        let calls = ReferenceFinder::Method
            .find_references_in_document(&ctx, spin, &cache)
            .unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].candidate_reason, Some(CandidateReason::OverloadResolutionFailure));
    }

    #[test]
    fn test_cancelled_token_stops_document_search() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(p, "A.cs", "class A {}");
        let a = b.declare_type(d, "A", TypeKind::Class).id();
        let solution = b.build().unwrap();

        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = context(&finder, &solution, FindReferencesSearchOptions::default(), &cancel);
        let err = ReferenceFinder::NamedType
            .determine_documents_to_search(&ctx, a, p, None)
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
