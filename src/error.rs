//! Errors surfaced by reference searches.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::base::{DocumentId, ProjectId, SymbolId};
use crate::find_symbols::RemoteError;

/// Why a search did not complete.
///
/// Empty results are not errors: a symbol with no dependent projects or an
/// ineligible type simply yields nothing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FindError {
    /// The caller's token was cancelled. Not a failure.
    #[error("search was cancelled")]
    Cancelled,

    /// Only aliases of types and namespaces can start a search.
    #[error("alias {alias} does not name a type or namespace")]
    UnsupportedAliasTarget { alias: SymbolId },

    #[error("{0} is not part of the solution")]
    MissingDocument(DocumentId),

    #[error("{0} is not part of the solution")]
    MissingProject(ProjectId),

    #[error("{0} is not a symbol of this solution")]
    UnknownSymbol(SymbolId),

    #[error("could not start the search scheduler: {0}")]
    Scheduler(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl FindError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FindError::Cancelled)
    }
}

pub type Result<T, E = FindError> = std::result::Result<T, E>;

/// `Err(Cancelled)` once `token` is cancelled.
pub(crate) fn check_cancelled(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(FindError::Cancelled)
    } else {
        Ok(())
    }
}
