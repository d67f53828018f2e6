//! Error types for repository syncs and orchestration.

use thiserror::Error;

use super::types::MAX_REPO_PAIRS;
use crate::source::SourceError;
use crate::store::StoreError;

/// A single repository sync failed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Retrieval failed: {0}")]
    Source(#[from] SourceError),

    #[error("Storage failed: {0}")]
    Store(#[from] StoreError),
}

/// The request was rejected before any network or store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("at most {max} owner/repo pairs may be requested, got {0}", max = MAX_REPO_PAIRS)]
    TooManyPairs(usize),

    #[error("owners and repos must have the same length ({owners} owners, {repos} repos)")]
    MismatchedPairs { owners: usize, repos: usize },

    #[error("invalid {field} name {value:?}")]
    InvalidName { field: &'static str, value: String },
}

/// An orchestration failed as a whole.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// Statistics could not be read from the store.
    #[error("Storage failed: {0}")]
    Store(#[from] StoreError),
}
