//! Per-document memoization shared by every finder searching a document.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::base::{SymbolId, TextSize};
use crate::hir::{SemanticModel, SymbolInfo, SymbolKind};
use crate::syntax::SyntaxToken;

/// Caches for one document during one search.
///
/// Several finders usually look at the same tokens; bindings and identifier
/// scans are computed once and shared.
pub struct FindReferenceCache<'a> {
    model: SemanticModel<'a>,
    symbol_infos: RwLock<FxHashMap<TextSize, SymbolInfo>>,
    identifier_tokens: RwLock<FxHashMap<SmolStr, Arc<[SyntaxToken]>>>,
    alias_names: OnceCell<FxHashSet<SmolStr>>,
}

impl<'a> FindReferenceCache<'a> {
    pub fn new(model: SemanticModel<'a>) -> Self {
        Self {
            model,
            symbol_infos: RwLock::new(FxHashMap::default()),
            identifier_tokens: RwLock::new(FxHashMap::default()),
            alias_names: OnceCell::new(),
        }
    }

    pub fn model(&self) -> SemanticModel<'a> {
        self.model
    }

    /// Memoized binding of `token`.
    pub fn symbol_info(&self, token: &SyntaxToken) -> SymbolInfo {
        if let Some(info) = self.symbol_infos.read().get(&token.start()) {
            return info.clone();
        }
        let info = self.model.symbol_info(token);
        self.symbol_infos
            .write()
            .entry(token.start())
            .or_insert(info)
            .clone()
    }

    /// The alias `token` resolved through, if any.
    ///
    /// Only tokens spelled like an alias declared in this document or
    /// project-wide are resolved.
    pub fn alias_info(&self, token: &SyntaxToken) -> Option<SymbolId> {
        let names = self.alias_names.get_or_init(|| self.collect_alias_names());
        let name = self.normalize(&token.value_text);
        if !names.contains(&name) {
            return None;
        }
        self.model.alias_info(token)
    }

    fn collect_alias_names(&self) -> FxHashSet<SmolStr> {
        let document = self.model.document();
        let solution = self.model.solution();
        let mut names: FxHashSet<SmolStr> = document
            .index
            .alias_names()
            .iter()
            .map(|n| self.normalize(n))
            .collect();
        if let Some(project) = solution.project(document.project) {
            for &alias in &project.global_aliases {
                let data = solution.symbol(alias);
                if data.kind == SymbolKind::Alias {
                    names.insert(self.normalize(&data.name));
                }
            }
        }
        names
    }

    /// Identifier tokens whose value text is `name`, in document order.
    ///
    /// Memoized per name. Documents that cannot contain `name` are rejected
    /// through the syntax index. In case-sensitive documents where no
    /// escaped spelling of `name` can occur the raw text is scanned;
    /// otherwise every token is visited, documentation-comment tokens
    /// included.
    pub fn find_matching_identifier_tokens(&self, name: &str) -> Arc<[SyntaxToken]> {
        if name.is_empty() {
            return Arc::from([]);
        }
        let key = SmolStr::new(name);
        if let Some(tokens) = self.identifier_tokens.read().get(&key) {
            return tokens.clone();
        }

        let tokens: Arc<[SyntaxToken]> = self.compute_matching_tokens(name).into();
        self.identifier_tokens
            .write()
            .entry(key)
            .or_insert(tokens)
            .clone()
    }

    fn compute_matching_tokens(&self, name: &str) -> Vec<SyntaxToken> {
        let document = self.model.document();
        let index = &document.index;
        let escaped = index.probably_contains_escaped_identifier(name);
        if !escaped && !index.probably_contains_identifier(name) {
            return Vec::new();
        }

        // Case-insensitive documents compare through the index's folding.
        if escaped || !index.is_case_sensitive() {
            let wanted = self.normalize(name);
            return document
                .syntax
                .tokens()
                .iter()
                .filter(|t| t.is_identifier() && self.normalize(&t.value_text) == wanted)
                .cloned()
                .collect();
        }

        let text: &str = &document.text;
        let continues_identifier = |c: char| c == '_' || unicode_ident::is_xid_continue(c);
        text.match_indices(name)
            // Matches inside a longer identifier never start a token.
            .filter(|&(offset, _)| {
                !text[..offset]
                    .chars()
                    .next_back()
                    .is_some_and(continues_identifier)
            })
            .filter_map(|(offset, _)| {
                let offset = TextSize::from(offset as u32);
                let token = document.syntax.token_at(offset)?;
                let whole = token.start() == offset
                    && token.is_identifier()
                    && !token.is_escaped
                    && u32::from(token.range.len()) as usize == name.len();
                whole.then(|| token.clone())
            })
            .collect()
    }

    fn normalize(&self, name: &str) -> SmolStr {
        self.model.document().index.normalize(name)
    }
}

impl std::fmt::Debug for FindReferenceCache<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FindReferenceCache")
            .field("document", &self.model.document().id)
            .field("names", &self.identifier_tokens.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::DocumentId;
    use crate::hir::{Language, Solution, SolutionBuilder, TypeKind};

    fn single_document(language: Language, text: &str) -> (Solution, DocumentId) {
        let mut b = SolutionBuilder::new();
        let p = b.add_project_with_language("P", language);
        let d = b.add_document(p, "doc", text);
        (b.build().unwrap(), d)
    }

    fn offsets(tokens: &[SyntaxToken]) -> Vec<u32> {
        tokens.iter().map(|t| u32::from(t.start())).collect()
    }

    #[test]
    fn test_empty_name_matches_nothing() {
        let (solution, d) = single_document(Language::CSharp, "class A { A a; }");
        let cache = FindReferenceCache::new(solution.semantic_model(d).unwrap());
        assert!(cache.find_matching_identifier_tokens("").is_empty());
    }

    #[test]
    fn test_fast_scan_requires_whole_identifiers() {
        let (solution, d) = single_document(
            Language::CSharp,
            "class Gear { Gearbox box; Gear g; string s = \"Gear\"; }",
        );
        let cache = FindReferenceCache::new(solution.semantic_model(d).unwrap());
        assert_eq!(offsets(&cache.find_matching_identifier_tokens("Gear")), vec![6, 26]);
        assert!(cache.find_matching_identifier_tokens("gear").is_empty());
    }

    #[test]
    fn test_escaped_identifiers_use_the_token_walk() {
        let (solution, d) =
            single_document(Language::CSharp, r"var a = @Widget; var b = Widget; /// Widget");
        let cache = FindReferenceCache::new(solution.semantic_model(d).unwrap());
        let tokens = cache.find_matching_identifier_tokens("Widget");
        assert_eq!(tokens.len(), 3);
        assert!(tokens[0].is_escaped);
        assert!(tokens[2].in_trivia);
    }

    #[test]
    fn test_case_insensitive_documents() {
        let (solution, d) =
            single_document(Language::VisualBasic, "Dim w As WIDGET = New widget()");
        let cache = FindReferenceCache::new(solution.semantic_model(d).unwrap());
        assert_eq!(cache.find_matching_identifier_tokens("Widget").len(), 2);
    }

    #[test]
    fn test_case_folding_matches_the_index_beyond_ascii() {
        // U+212A KELVIN SIGN lowercases to an ASCII `k`.
        let (solution, d) =
            single_document(Language::VisualBasic, "Dim \u{212A}elvin As Kelvin = kelvin");
        let cache = FindReferenceCache::new(solution.semantic_model(d).unwrap());
        assert!(solution.document(d).unwrap().index.probably_contains_identifier("KELVIN"));
        assert_eq!(cache.find_matching_identifier_tokens("KELVIN").len(), 3);
    }

    #[test]
    fn test_results_are_memoized() {
        let (solution, d) = single_document(Language::CSharp, "Gear g;");
        let cache = FindReferenceCache::new(solution.semantic_model(d).unwrap());
        let first = cache.find_matching_identifier_tokens("Gear");
        let second = cache.find_matching_identifier_tokens("Gear");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_alias_info_only_for_alias_names() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(p, "a.cs", "using W = Widget; class Widget {} class X { W w; }");
        let widget = b.declare_type(d, "Widget", TypeKind::Class).occurrence(1).id();
        let alias = b.declare_alias(d, "W", widget);
        b.bind(d, "W", widget).via_alias(alias);
        let solution = b.build().unwrap();

        let cache = FindReferenceCache::new(solution.semantic_model(d).unwrap());
        let w_tokens = cache.find_matching_identifier_tokens("W");
        assert_eq!(w_tokens.len(), 2);
        assert_eq!(cache.alias_info(&w_tokens[1]), Some(alias));
        assert_eq!(cache.symbol_info(&w_tokens[1]).symbol, Some(widget));
        let x = cache.find_matching_identifier_tokens("X");
        assert_eq!(cache.alias_info(&x[0]), None);
    }
}
