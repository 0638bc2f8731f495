//! High-level IR: the compiled view of a solution.
//!
//! This layer stands in for a compiler front end. It owns projects,
//! documents, symbols and token bindings, and exposes them as an immutable
//! [`Solution`] snapshot.
//!
//! ## Key Data Structures
//!
//! - [`Solution`] - cheap-to-clone snapshot handle
//! - [`SymbolData`] - everything the engine may ask about a symbol
//! - [`SemanticModel`] - per-document binding queries
//! - [`DependencyGraph`] - project references and their topological order
//! - [`SolutionBuilder`] - the only way to produce a snapshot

mod builder;
mod graph;
mod semantic;
mod solution;
mod symbols;

pub use builder::{Binding, BuildError, Declaration, MetadataSymbolId, SolutionBuilder, SymbolRef};
pub use graph::DependencyGraph;
pub use semantic::SemanticModel;
pub use solution::{AssemblyInfo, Document, Language, Project, Solution, WeakSolution};
pub use symbols::{
    Accessibility, CandidateReason, MethodKind, Modifiers, SourceLocation, SymbolData,
    SymbolInfo, SymbolKind, SymbolOrigin, TypeKind, ValueUsage,
};
