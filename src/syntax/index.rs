//! Cheap per-document syntactic index.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use super::{SyntaxTree, TokenKind};

/// The case folding used for every identifier comparison in
/// case-insensitive languages.
pub fn fold_case(name: &str, case_sensitive: bool) -> SmolStr {
    if case_sensitive {
        SmolStr::new(name)
    } else {
        SmolStr::new(name.to_lowercase())
    }
}

/// Precomputed facts about a document's identifiers.
///
/// Built once per document. Answers are "probably": a positive answer only
/// means the text of an identifier matches, not that it binds to anything.
#[derive(Clone, Debug, Default)]
pub struct SyntaxTreeIndex {
    case_sensitive: bool,
    /// Value texts of every identifier (normalized for case-insensitive languages).
    identifiers: FxHashSet<SmolStr>,
    /// Value texts of identifiers written with `@` or `\uXXXX` escapes.
    escaped_identifiers: FxHashSet<SmolStr>,
    /// Names introduced by `using Alias = Target;` directives.
    alias_names: Vec<SmolStr>,
    /// Whether the document contains a target-typed `new(...)`.
    contains_implicit_object_creation: bool,
}

impl SyntaxTreeIndex {
    pub fn new(tree: &SyntaxTree, case_sensitive: bool) -> Self {
        let mut index = Self {
            case_sensitive,
            ..Self::default()
        };

        let tokens = tree.tokens();
        for (i, token) in tokens.iter().enumerate() {
            match token.kind {
                TokenKind::Identifier => {
                    let name = index.normalize(&token.value_text);
                    if token.is_escaped {
                        index.escaped_identifiers.insert(name.clone());
                    }
                    index.identifiers.insert(name);
                }
                TokenKind::Keyword if token.value_text == "using" && !token.in_trivia => {
                    if let [alias, eq, ..] = &tokens[i + 1..] {
                        if alias.is_identifier() && eq.kind == TokenKind::Equals {
                            index.alias_names.push(alias.value_text.clone());
                        }
                    }
                }
                TokenKind::Keyword if token.value_text == "new" => {
                    if tokens.get(i + 1).is_some_and(|next| next.value_text == "(") {
                        index.contains_implicit_object_creation = true;
                    }
                }
                _ => {}
            }
        }

        index
    }

    /// `name` as stored in this index.
    pub fn normalize(&self, name: &str) -> SmolStr {
        fold_case(name, self.case_sensitive)
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn probably_contains_identifier(&self, name: &str) -> bool {
        !name.is_empty() && self.identifiers.contains(&self.normalize(name))
    }

    pub fn probably_contains_escaped_identifier(&self, name: &str) -> bool {
        !name.is_empty() && self.escaped_identifiers.contains(&self.normalize(name))
    }

    pub fn alias_names(&self) -> &[SmolStr] {
        &self.alias_names
    }

    pub fn contains_implicit_object_creation(&self) -> bool {
        self.contains_implicit_object_creation
    }
}
