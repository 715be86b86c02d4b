//! Errors captured by a route match

use crate::route::ContentKind;
use crate::id::MatchId;

/// Boxed source error carried by [`MatchError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures recorded on a match's `error` field
///
/// None of these are returned from `load()`; they surface through
/// `status == Error` plus the stored error.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Invalid search params found")]
    InvalidSearchParams(#[source] BoxError),

    #[error("route import failed")]
    Import(#[source] BoxError),

    #[error("failed to resolve {slot} content")]
    Content {
        slot: ContentKind,
        #[source]
        source: BoxError,
    },

    #[error("route loader failed")]
    Loader(#[source] BoxError),

    #[error("no match registered with id {0}")]
    UnknownMatch(MatchId),

    #[error("cannot attach {0} beneath its own descendant")]
    InvalidParent(MatchId),
}

impl MatchError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::InvalidSearchParams(_) => "INVALID_SEARCH_PARAMS",
            MatchError::Import(_) => "IMPORT_FAILED",
            MatchError::Content { .. } => "CONTENT_FAILED",
            MatchError::Loader(_) => "LOADER_FAILED",
            MatchError::UnknownMatch(_) => "UNKNOWN_MATCH",
            MatchError::InvalidParent(_) => "INVALID_PARENT",
        }
    }
}
