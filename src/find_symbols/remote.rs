//! Out-of-process delegation of dependent-type searches.

use smol_str::SmolStr;
use thiserror::Error;

use crate::base::ProjectId;
use crate::hir::Solution;

use super::dependent_types::DependentTypeKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote host is unavailable")]
    Unavailable,

    #[error("remote call failed: {0}")]
    Failed(String),
}

/// A dependent-type query in a form that can cross a process boundary.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DependentTypesRequest {
    pub kind: DependentTypeKind,
    /// Project whose compilation the starting type was taken from.
    pub project: ProjectId,
    pub type_key: SmolStr,
    pub transitive: bool,
    /// Sorted project scope, `None` for the whole solution.
    pub scope: Option<Vec<ProjectId>>,
}

/// A symbol answer: the key as seen from `project`'s compilation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SerializedSymbol {
    pub project: ProjectId,
    pub key: SmolStr,
}

/// A host that can run searches against a synchronized copy of the solution.
pub trait RemoteHostClient: Send + Sync {
    /// `Ok(None)` means the host has nothing to offer and the search runs locally.
    fn find_dependent_types(
        &self,
        solution: &Solution,
        request: &DependentTypesRequest,
    ) -> Result<Option<Vec<SerializedSymbol>>, RemoteError>;
}
