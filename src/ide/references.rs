//! Find references: the position-based entry point.
//!
//! Resolves the identifier under the cursor to a symbol (its declaration
//! or the symbol it binds to) and runs a full reference search for it.

use rustc_hash::FxHashSet;
use tokio_util::sync::CancellationToken;

use crate::base::{DocumentId, LineCol, SymbolId, TextRange, TextSize};
use crate::error::{FindError, Result};
use crate::find_symbols::{FindReferencesSearchOptions, SymbolFinder};
use crate::hir::{Document, Solution};
use crate::syntax::{SyntaxToken, TokenKind};

/// A single location in a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub document: DocumentId,
    pub path: String,
    pub range: TextRange,
    /// Start position (0-indexed)
    pub start: LineCol,
    /// End position (0-indexed)
    pub end: LineCol,
    /// Whether this is the declaration rather than a use.
    pub is_definition: bool,
    /// The searched symbol the location belongs to.
    pub symbol: SymbolId,
}

/// Result of a find-references request.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResult {
    /// Declarations of every reported definition, in report order.
    pub definitions: Vec<Reference>,
    /// Uses, in report order, without duplicates.
    pub references: Vec<Reference>,
}

impl ReferenceResult {
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.references.is_empty()
    }

    /// Definitions followed by references.
    pub fn all(&self) -> impl Iterator<Item = &Reference> {
        self.definitions.iter().chain(&self.references)
    }
}

/// Find all references to the symbol at `offset` in `document`.
///
/// Returns `Ok(None)` when no symbol is declared at or bound to the token
/// under the cursor.
pub fn find_references_at(
    finder: &SymbolFinder,
    solution: &Solution,
    document: DocumentId,
    offset: TextSize,
    options: FindReferencesSearchOptions,
    cancel: &CancellationToken,
) -> Result<Option<ReferenceResult>> {
    let doc = solution
        .document(document)
        .ok_or(FindError::MissingDocument(document))?;
    let Some(symbol) = symbol_at(solution, doc, offset) else {
        return Ok(None);
    };

    let options = options.for_starting_symbol(solution, symbol);
    let referenced = finder.find_references_collect(solution, &[symbol], None, options, cancel)?;

    let mut result = ReferenceResult::default();
    let mut seen: FxHashSet<(DocumentId, TextRange)> = FxHashSet::default();
    for entry in &referenced {
        for &member in entry.definition.symbols() {
            for location in solution.symbol(member).source_locations() {
                if seen.insert((location.document, location.range)) {
                    let definition =
                        reference(solution, location.document, location.range, member, true);
                    result.definitions.extend(definition);
                }
            }
        }
        for (member, location) in &entry.locations {
            if seen.insert((location.document, location.range)) {
                let found = reference(solution, location.document, location.range, *member, false);
                result.references.extend(found);
            }
        }
    }
    Ok(Some(result))
}

/// The symbol declared at, or referenced by, the token under `offset`.
///
/// A cursor just past the end of an identifier still selects it.
fn symbol_at(solution: &Solution, doc: &Document, offset: TextSize) -> Option<SymbolId> {
    let tree = &doc.syntax;
    let searchable = |t: &&SyntaxToken| {
        t.is_identifier() || (t.kind == TokenKind::Keyword && t.value_text == "new")
    };
    let token = tree
        .token_at(offset)
        .filter(searchable)
        .or_else(|| {
            let before = offset.checked_sub(TextSize::from(1))?;
            tree.token_at(before).filter(searchable)
        })?;

    if let Some(declared) = solution.declared_symbol_at(doc.id, token.start()) {
        return Some(declared);
    }
    let model = solution.semantic_model(doc.id)?;
    let info = model.symbol_info(token);
    info.symbol.or_else(|| info.candidates.first().copied())
}

fn reference(
    solution: &Solution,
    document: DocumentId,
    range: TextRange,
    symbol: SymbolId,
    is_definition: bool,
) -> Option<Reference> {
    let doc = solution.document(document)?;
    Some(Reference {
        document,
        path: doc.path.to_string(),
        range,
        start: doc.line_index.line_col(range.start()),
        end: doc.line_index.line_col(range.end()),
        is_definition,
        symbol,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{SolutionBuilder, SymbolKind, TypeKind};

    #[test]
    fn test_find_references_from_a_use() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("Shop");
        let d1 = b.add_document(p, "Widget.cs", "class Widget {\n    void Spin() {}\n}");
        let d2 = b.add_document(
            p,
            "Use.cs",
            "class Use {\n    void F(Widget w) { w.Spin(); w.Spin(); }\n}",
        );
        let widget = b.declare_type(d1, "Widget", TypeKind::Class).id();
        let spin = b.declare_member(widget, "Spin", SymbolKind::Method).id();
        b.declare_type(d2, "Use", TypeKind::Class);
        b.bind(d2, "Widget", widget);
        b.bind(d2, "Spin", spin);
        let solution = b.build().unwrap();

        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        // Cursor on the first `Spin` call.
        let text = &solution.document(d2).unwrap().text;
        let offset = TextSize::from(text.find("Spin").unwrap() as u32);
        let result = find_references_at(&finder, &solution, d2, offset, Default::default(), &cancel)
            .unwrap()
            .unwrap();

        assert_eq!(result.definitions.len(), 1);
        assert_eq!(result.definitions[0].start, LineCol::new(1, 9));
        assert_eq!(result.references.len(), 2);
        assert!(result.references.iter().all(|r| r.path == "Use.cs" && !r.is_definition));
        assert_eq!(result.all().count(), 3);
    }

    #[test]
    fn test_no_symbol_under_cursor() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("Shop");
        let d = b.add_document(p, "A.cs", "class A { }");
        let solution = b.build().unwrap();

        let finder = SymbolFinder::new();
        let cancel = CancellationToken::new();
        let offset = TextSize::from(7);
        let result =
            find_references_at(&finder, &solution, d, offset, Default::default(), &cancel).unwrap();
        assert!(result.is_none());
        let missing = find_references_at(
            &finder,
            &solution,
            DocumentId::new(7),
            TextSize::from(0),
            Default::default(),
            &cancel,
        );
        assert_eq!(missing.unwrap_err(), FindError::MissingDocument(DocumentId::new(7)));
    }
}
