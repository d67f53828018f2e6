//! Progress reporting types for sync operations.
//!
//! The engine never prints. Callers that want feedback pass a
//! [`ProgressCallback`] and render the events themselves.

use super::types::SyncMode;

/// Progress events emitted during an orchestration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Starting to sync a batch of repositories.
    SyncingRepos { count: usize },

    /// Starting one repository.
    RepoStarted {
        owner: String,
        repo: String,
        mode: SyncMode,
    },

    /// Fetched a page of events.
    FetchedPage {
        owner: String,
        repo: String,
        /// Page number (1-indexed).
        page: u32,
        /// Events on this page.
        count: usize,
        /// Running total of events fetched so far.
        total_so_far: usize,
        /// Expected total pages, if known.
        expected_pages: Option<u32>,
    },

    /// Finished fetching a repository's events.
    FetchComplete {
        owner: String,
        repo: String,
        total: usize,
    },

    /// New events written to the store.
    Persisted {
        owner: String,
        repo: String,
        inserted: u64,
        skipped_malformed: usize,
    },

    /// A repository sync failed; the orchestration continues.
    RepoFailed {
        owner: String,
        repo: String,
        error: String,
    },

    /// All repositories processed.
    SyncReposComplete { successful: usize, failed: usize },

    /// Computing rolling statistics over the stored events.
    ComputingStats { repos: usize },
}

/// Callback type for progress reporting.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
