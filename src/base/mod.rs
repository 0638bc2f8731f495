//! Foundation types for the refscope engine.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`ProjectId`], [`DocumentId`], [`SymbolId`] - Interned handles into a solution snapshot
//! - [`SolutionId`] - Identity of one immutable solution snapshot
//! - [`TextRange`], [`TextSize`] - Source positions
//! - [`LineCol`], [`LineIndex`] - Line/column conversion
//!
//! This module has NO dependencies on other refscope modules.

mod ids;
mod span;

pub use ids::{DocumentId, ProjectId, SolutionId, SymbolId};
pub use span::{LineCol, LineIndex, TextRange, TextSize};

// Re-export text-size types for convenience
pub use text_size;
