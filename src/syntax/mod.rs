//! Syntax layer: tokens, token trees and per-document syntactic indexes.
//!
//! Documents are never parsed into a full syntax tree. The engine only needs
//! identifier tokens (including the ones inside documentation comments) and a
//! cheap index that answers "could this name appear here at all?".

mod index;
mod lexer;

pub use index::{SyntaxTreeIndex, fold_case};
pub use lexer::{SyntaxToken, TokenKind};

use crate::base::TextSize;

/// Source language of a document; decides keywords and identifier case
/// sensitivity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    CSharp,
    VisualBasic,
}

impl Language {
    pub fn is_case_sensitive(self) -> bool {
        matches!(self, Language::CSharp)
    }
}

/// The token stream of one document, ordered by offset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyntaxTree {
    tokens: Vec<SyntaxToken>,
}

impl SyntaxTree {
    pub fn parse(text: &str, language: Language) -> Self {
        Self {
            tokens: lexer::tokenize(text, language),
        }
    }

    /// All tokens, structured trivia included, in document order.
    pub fn tokens(&self) -> &[SyntaxToken] {
        &self.tokens
    }

    /// Identifier tokens only.
    pub fn identifiers(&self) -> impl Iterator<Item = &SyntaxToken> {
        self.tokens.iter().filter(|t| t.is_identifier())
    }

    /// The token whose range contains `offset`, if any.
    pub fn token_at(&self, offset: TextSize) -> Option<&SyntaxToken> {
        let idx = self.tokens.partition_point(|t| t.range.end() <= offset);
        self.tokens
            .get(idx)
            .filter(|t| t.range.contains(offset))
    }

    /// The token immediately after `token` in document order.
    pub fn next_token(&self, token: &SyntaxToken) -> Option<&SyntaxToken> {
        let idx = self.tokens.partition_point(|t| t.start() <= token.start());
        self.tokens.get(idx)
    }

    /// The token immediately before `token` in document order.
    pub fn previous_token(&self, token: &SyntaxToken) -> Option<&SyntaxToken> {
        let idx = self.tokens.partition_point(|t| t.start() < token.start());
        idx.checked_sub(1).and_then(|i| self.tokens.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_at_finds_covering_token() {
        let tree = SyntaxTree::parse("class Widget { }", Language::CSharp);

        let token = tree.token_at(TextSize::from(8)).unwrap();
        assert_eq!(token.value_text, "Widget");
        assert!(tree.token_at(TextSize::from(5)).is_none(), "whitespace has no token");
    }

    #[test]
    fn test_neighbouring_tokens() {
        let tree = SyntaxTree::parse("new Widget()", Language::CSharp);
        let widget = tree.identifiers().next().unwrap();

        assert_eq!(tree.previous_token(widget).unwrap().value_text, "new");
        assert_eq!(tree.next_token(widget).unwrap().value_text, "(");
    }
}
