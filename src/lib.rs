//! # refscope
//!
//! Cross-project "find references" over a multi-project source graph.
//!
//! Given one or more starting symbols, the engine expands them into every
//! symbol that should be treated as "the same" for navigation (constructors
//! of a type, accessors of a property, interface members and their
//! implementations, overrides, linked copies in other projects), decides
//! which projects and documents could possibly mention them, and scans
//! those documents in parallel, reporting definitions and references
//! through a progress sink.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide           → Position-based entry points (find references at cursor)
//!   ↓
//! find_symbols  → Search engine: cascades, finders, dependent projects/types
//!   ↓
//! hir           → Solution snapshot: projects, documents, symbols, bindings
//!   ↓
//! syntax        → Lexer + per-document identifier index
//!   ↓
//! base          → Primitives (ids, TextRange, LineCol)
//! ```
//!
//! ## Usage
//!
//! ```
//! use refscope::{
//!     FindReferencesSearchOptions, SolutionBuilder, SymbolFinder, SymbolKind, TypeKind,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let mut b = SolutionBuilder::new();
//! let p = b.add_project("App");
//! let d = b.add_document(p, "Main.cs", "class Main { void Run() { Run(); } }");
//! let main = b.declare_type(d, "Main", TypeKind::Class).id();
//! let run = b.declare_member(main, "Run", SymbolKind::Method).id();
//! b.bind(d, "Run", run);
//! let solution = b.build().unwrap();
//!
//! let finder = SymbolFinder::new();
//! let options = FindReferencesSearchOptions::default();
//! let found = finder
//!     .find_references_collect(&solution, &[run], None, options, &CancellationToken::new())
//!     .unwrap();
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].locations.len(), 1);
//! ```

/// Foundation types: ids, text ranges, line/column conversion
pub mod base;

/// Error type shared by every search entry point
pub mod error;

/// The reference search engine
pub mod find_symbols;

/// Solution snapshot and its builder
pub mod hir;

/// IDE features: find references at a cursor position
pub mod ide;

/// Tokens and the per-document identifier index
pub mod syntax;

pub use base::{DocumentId, LineCol, LineIndex, ProjectId, SymbolId, TextRange, TextSize};
pub use error::{FindError, Result};
pub use find_symbols::{
    FindReferencesProgress, FindReferencesSearchOptions, ReferenceLocation, ReferencedSymbol,
    SymbolFinder, SymbolGroup,
};
pub use hir::{Solution, SolutionBuilder, SymbolKind, TypeKind};
pub use ide::{Reference, ReferenceResult, find_references_at};
