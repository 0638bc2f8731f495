//! Tokenizer for the C#-like surface syntax of source documents.

use logos::Logos;
use smol_str::SmolStr;

use super::Language;
use crate::base::{TextRange, TextSize};

/// Raw token classes recognized by the lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawKind {
    #[regex(r"//[^\n]*")]
    LineComment,

    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLiteral,

    /// `@"..."`: backslashes are literal and `""` is an embedded quote.
    #[regex(r#"@"([^"]|"")*""#)]
    VerbatimString,

    #[regex(r"'([^'\\\n]|\\.)*'")]
    CharLiteral,

    #[regex(r"[0-9][0-9A-Za-z_]*")]
    Number,

    #[regex(r"@?(\p{XID_Start}|_|\\u[0-9a-fA-F]{4})(\p{XID_Continue}|\\u[0-9a-fA-F]{4})*")]
    Identifier,

    #[token("=")]
    Equals,

    #[regex(r"[.;{}()\[\]<>,:?!+\-*/%&|^~]")]
    Punct,
}

/// C# reserved words; they never lex as identifiers unless written verbatim
/// (`@class`). Contextual keywords such as `get` or `var` stay identifiers.
const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "case", "catch", "class", "const", "continue",
    "default", "delegate", "do", "else", "enum", "event", "explicit", "false", "finally", "for",
    "foreach", "if", "implicit", "in", "int", "interface", "internal", "is", "namespace", "new",
    "null", "object", "operator", "out", "override", "private", "protected", "public", "readonly",
    "ref", "return", "sealed", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "using", "virtual", "void", "while",
];

/// Visual Basic reserved words, lowercased; matched case-insensitively.
const VB_KEYWORDS: &[&str] = &[
    "addressof", "and", "as", "boolean", "byref", "byval", "call", "case", "catch", "class",
    "const", "delegate", "dim", "do", "each", "else", "end", "enum", "event", "false", "finally",
    "for", "friend", "function", "handles", "if", "implements", "imports", "in", "inherits",
    "integer", "interface", "is", "loop", "me", "module", "mustoverride", "mybase", "namespace",
    "new", "next", "not", "nothing", "object", "of", "or", "overridable", "overrides", "private",
    "protected", "public", "return", "select", "shared", "string", "structure", "sub", "then",
    "throw", "to", "true", "try", "while",
];

pub(crate) fn is_keyword(text: &str, language: Language) -> bool {
    match language {
        Language::CSharp => CSHARP_KEYWORDS.binary_search(&text).is_ok(),
        Language::VisualBasic => VB_KEYWORDS
            .binary_search(&text.to_ascii_lowercase().as_str())
            .is_ok(),
    }
}

/// Classification of a token in the syntax tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Keyword,
    Literal,
    Equals,
    Punctuation,
}

/// A token with its source range and, for identifiers, its value text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxToken {
    pub kind: TokenKind,
    /// Range of the raw text, including any `@` prefix or escape sequences.
    pub range: TextRange,
    /// The identifier as the compiler sees it: `@` stripped, `\uXXXX` decoded.
    pub value_text: SmolStr,
    /// True when the raw text differs from the value text.
    pub is_escaped: bool,
    /// True for tokens found inside documentation-comment structured trivia.
    pub in_trivia: bool,
}

impl SyntaxToken {
    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    pub fn start(&self) -> TextSize {
        self.range.start()
    }
}

/// Lex `text` into tokens in offset order.
///
/// `///` and `/** */` documentation comments are re-lexed and contribute
/// their tokens flagged `in_trivia`; other comments produce nothing.
pub(crate) fn tokenize(text: &str, language: Language) -> Vec<SyntaxToken> {
    let mut tokens = Vec::new();
    Lexing { language, out: &mut tokens }.lex(text, 0, false);
    tokens
}

struct Lexing<'o> {
    language: Language,
    out: &'o mut Vec<SyntaxToken>,
}

impl Lexing<'_> {
    fn lex(&mut self, text: &str, base: u32, in_trivia: bool) {
        let mut lexer = RawKind::lexer(text);
        while let Some(result) = lexer.next() {
            let span = lexer.span();
            let slice = lexer.slice();
            let range = TextRange::new(
                TextSize::from(base + span.start as u32),
                TextSize::from(base + span.end as u32),
            );
            let kind = match result {
                Ok(RawKind::LineComment) => {
                    if !in_trivia && slice.starts_with("///") {
                        self.lex(&slice[3..], base + span.start as u32 + 3, true);
                    }
                    continue;
                }
                Ok(RawKind::BlockComment) => {
                    if !in_trivia && is_doc_block(slice) {
                        self.lex(&slice[3..slice.len() - 2], base + span.start as u32 + 3, true);
                    }
                    continue;
                }
                Err(()) => continue,
                // `cref="Widget"`: attribute values inside doc comments name symbols.
                Ok(RawKind::StringLiteral) if in_trivia && slice.len() >= 2 => {
                    self.lex(&slice[1..slice.len() - 1], base + span.start as u32 + 1, true);
                    continue;
                }
                Ok(
                    RawKind::StringLiteral
                    | RawKind::VerbatimString
                    | RawKind::CharLiteral
                    | RawKind::Number,
                ) => TokenKind::Literal,
                Ok(RawKind::Equals) => TokenKind::Equals,
                Ok(RawKind::Punct) => TokenKind::Punctuation,
                Ok(RawKind::Identifier) => {
                    let value_text = decode_identifier(slice);
                    let is_escaped = value_text != slice;
                    let keyword =
                        !slice.starts_with('@') && is_keyword(&value_text, self.language);
                    let kind = if keyword {
                        TokenKind::Keyword
                    } else {
                        TokenKind::Identifier
                    };
                    self.out.push(SyntaxToken {
                        kind,
                        range,
                        value_text,
                        is_escaped,
                        in_trivia,
                    });
                    continue;
                }
            };
            self.out.push(SyntaxToken {
                kind,
                range,
                value_text: SmolStr::new(slice),
                is_escaped: false,
                in_trivia,
            });
        }
    }
}

/// `/** ... */`, but not `/**/` or a `/***` banner.
fn is_doc_block(comment: &str) -> bool {
    comment.len() > 4 && comment.starts_with("/**") && !comment.starts_with("/***")
}

/// Strip a verbatim `@` and decode `\uXXXX` escapes.
///
/// A malformed escape is kept verbatim rather than dropped.
fn decode_identifier(raw: &str) -> SmolStr {
    let raw = raw.strip_prefix('@').unwrap_or(raw);
    if !raw.contains('\\') {
        return SmolStr::new(raw);
    }

    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find("\\u") {
        decoded.push_str(&rest[..pos]);
        let escape = &rest[pos..];
        let ch = escape
            .get(2..6)
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match ch {
            Some(ch) => {
                decoded.push(ch);
                rest = &escape[6..];
            }
            None => {
                decoded.push_str("\\u");
                rest = &escape[2..];
            }
        }
    }
    decoded.push_str(rest);
    SmolStr::new(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identifiers(text: &str) -> Vec<(String, bool, bool)> {
        identifiers_in(text, Language::CSharp)
    }

    fn identifiers_in(text: &str, language: Language) -> Vec<(String, bool, bool)> {
        tokenize(text, language)
            .into_iter()
            .filter(|t| t.is_identifier())
            .map(|t| (t.value_text.to_string(), t.is_escaped, t.in_trivia))
            .collect()
    }

    #[test]
    fn test_keywords_are_sorted_for_binary_search() {
        for keywords in [CSHARP_KEYWORDS, VB_KEYWORDS] {
            let mut sorted = keywords.to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted, keywords);
        }
    }

    #[test]
    fn test_keywords_are_not_identifiers() {
        let ids = identifiers("public class Foo : IBar { }");
        assert_eq!(
            ids,
            vec![("Foo".into(), false, false), ("IBar".into(), false, false)]
        );
    }

    #[test]
    fn test_verbatim_and_unicode_escapes() {
        let ids = identifiers(r"int @class = \u0046oo;");
        assert_eq!(
            ids,
            vec![("class".into(), true, false), ("Foo".into(), true, false)]
        );
    }

    #[test]
    fn test_doc_comment_is_structured_trivia() {
        let ids = identifiers(
            "/// <see cref=\"Widget\"/>\nclass Widget {} // Widget\nvar s = \"Widget\";",
        );
        assert!(ids.iter().any(|(name, _, trivia)| name == "see" && *trivia));
        assert!(ids.contains(&("Widget".into(), false, true)));
        assert_eq!(
            ids.iter().filter(|(name, _, _)| name == "Widget").count(),
            2,
            "plain strings and plain comments are not identifiers"
        );
    }

    #[test]
    fn test_token_ranges_point_at_raw_text() {
        let text = "x.Run();";
        let run = tokenize(text, Language::CSharp)
            .into_iter()
            .find(|t| t.value_text == "Run")
            .unwrap();
        assert_eq!(&text[run.range], "Run");
    }

    #[test]
    fn test_contextual_keywords_are_identifiers() {
        let names: Vec<String> = identifiers("var get = set;")
            .into_iter()
            .map(|(name, _, _)| name)
            .collect();
        assert_eq!(names, vec!["var", "get", "set"]);
    }

    #[test]
    fn test_visual_basic_keywords_ignore_case() {
        let text = "DIM w As Widget = NEW Widget() : Dim Var";
        let names: Vec<String> = identifiers_in(text, Language::VisualBasic)
            .into_iter()
            .map(|(name, _, _)| name)
            .collect();
        assert_eq!(names, vec!["w", "Widget", "Widget", "Var"]);
    }

    #[test]
    fn test_verbatim_strings_keep_backslashes() {
        let text = r#"var p = @"C:\"; Widget w; var q = @"say ""Widget""";"#;
        let names: Vec<String> = identifiers(text).into_iter().map(|(name, _, _)| name).collect();
        assert_eq!(names, vec!["var", "p", "Widget", "w", "var", "q"]);
    }

    #[test]
    fn test_block_doc_comment_is_structured_trivia() {
        let ids = identifiers("/** <see cref=\"Widget\"/> */ /* Widget */ /**/ class Widget {}");
        assert_eq!(
            ids.iter().filter(|(name, _, _)| name == "Widget").collect::<Vec<_>>(),
            vec![&("Widget".to_string(), false, true), &("Widget".to_string(), false, false)]
        );
    }
}
