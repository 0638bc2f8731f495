//! Identifiers for projects, documents, symbols and solution snapshots.

use std::fmt;

use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $display:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub u32);

        impl $name {
            /// Create a new id from a raw index.
            #[inline]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            /// Get the raw index.
            #[inline]
            pub const fn index(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($display, "#{}"), self.0)
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u32 {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// A lightweight handle for a project within a solution.
    ///
    /// Ids are assigned in insertion order by the solution builder and are
    /// stable for the lifetime of a snapshot.
    ProjectId,
    "project"
);

define_id!(
    /// A lightweight handle for a document within a solution.
    ///
    /// Linked documents (the same file included by several projects) get one
    /// `DocumentId` per project.
    DocumentId,
    "document"
);

define_id!(
    /// A handle into the solution's symbol table.
    ///
    /// Two `SymbolId`s may still denote the same logical symbol: metadata
    /// symbols are instantiated once per referencing compilation. Use
    /// [`crate::find_symbols::SymbolIdentity`] when unification matters.
    SymbolId,
    "symbol"
);

/// Identity of one immutable solution snapshot.
///
/// Every call to `SolutionBuilder::build` produces a fresh id, so caches keyed
/// by it can never serve results computed against another snapshot.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct SolutionId(Uuid);

impl SolutionId {
    /// Create a fresh, never-before-seen snapshot id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SolutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SolutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SolutionId({})", self.0.simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_equality() {
        assert_eq!(ProjectId::new(1), ProjectId::new(1));
        assert_ne!(DocumentId::new(1), DocumentId::new(2));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", ProjectId::new(3)), "project#3");
        assert_eq!(format!("{:?}", SymbolId::new(7)), "SymbolId(7)");
    }

    #[test]
    fn test_id_size() {
        assert_eq!(std::mem::size_of::<SymbolId>(), 4);
    }

    #[test]
    fn test_solution_ids_are_unique() {
        assert_ne!(SolutionId::new(), SolutionId::new());
    }
}
