//! Per-document semantic queries.

use super::solution::{Document, Solution};
use super::symbols::SymbolInfo;
use crate::base::{ProjectId, SymbolId};
use crate::syntax::SyntaxToken;

/// Binding information for the tokens of one document.
///
/// Bindings are produced by the compilation layer and stored on the
/// document; a `SemanticModel` is a borrowed view over them.
#[derive(Clone, Copy)]
pub struct SemanticModel<'a> {
    solution: &'a Solution,
    document: &'a Document,
}

impl<'a> SemanticModel<'a> {
    pub(crate) fn new(solution: &'a Solution, document: &'a Document) -> Self {
        Self { solution, document }
    }

    pub fn solution(&self) -> &'a Solution {
        self.solution
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// The compilation the bindings were produced in.
    pub fn compilation(&self) -> ProjectId {
        self.document.project
    }

    /// What `token` refers to. Empty for declarations and unbound tokens.
    pub fn symbol_info(&self, token: &SyntaxToken) -> SymbolInfo {
        self.document
            .bindings
            .get(&token.start())
            .cloned()
            .unwrap_or_default()
    }

    /// The alias `token` was resolved through, if any.
    pub fn alias_info(&self, token: &SyntaxToken) -> Option<SymbolId> {
        self.document.alias_bindings.get(&token.start()).copied()
    }

    /// The symbol declared by `token`, if `token` is a declaration's name.
    pub fn declared_symbol(&self, token: &SyntaxToken) -> Option<SymbolId> {
        self.document.declarations.get(&token.start()).copied()
    }
}

impl std::fmt::Debug for SemanticModel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticModel")
            .field("document", &self.document.id)
            .finish()
    }
}
