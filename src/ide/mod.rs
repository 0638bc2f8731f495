//! IDE features: position-based entry points over the search engine.
//!
//! Functions here take a document and an offset, resolve the symbol under
//! the cursor, and return plain result types with line/column positions.
//!
//! ## Usage
//!
//! ```ignore
//! use refscope::find_symbols::{FindReferencesSearchOptions, SymbolFinder};
//! use refscope::ide::find_references_at;
//!
//! let finder = SymbolFinder::new();
//! let options = FindReferencesSearchOptions::default();
//! let result = find_references_at(&finder, &solution, document, offset, options, &cancel)?;
//! ```

mod references;

pub use references::{find_references_at, Reference, ReferenceResult};
