//! Sync types and constants.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Events requested per page (the API maximum).
pub const PAGE_SIZE: u32 = 100;

/// Maximum owner/repo pairs accepted by one orchestration.
pub const MAX_REPO_PAIRS: usize = 5;

/// Default concurrency for page fetching operations.
/// Limited to 2 to avoid hitting secondary rate limits.
pub const DEFAULT_PAGE_FETCH_CONCURRENCY: usize = 2;

/// Default page depth of an incremental sync.
pub const DEFAULT_MAX_INCREMENTAL_PAGES: u32 = 10;

/// Maximum backoff delay in milliseconds between retries.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum retries for a single page fetch.
pub const MAX_FETCH_RETRIES: u32 = 3;

/// Options for syncing a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Concurrent page fetches during a backfill.
    pub page_concurrency: usize,
    /// Pages an incremental sync may read before it stops looking for
    /// already-stored events. `1` reads only the newest page.
    pub max_incremental_pages: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_concurrency: DEFAULT_PAGE_FETCH_CONCURRENCY,
            max_incremental_pages: DEFAULT_MAX_INCREMENTAL_PAGES,
        }
    }
}

/// Which path a repository sync took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// No events were stored; every available page was fetched.
    Backfill,
    /// Events were already stored; only the newest pages were fetched.
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backfill => write!(f, "backfill"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

/// Result of syncing a single repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSyncResult {
    pub owner: String,
    pub repo: String,
    /// Repository name the events are stored under, taken from the source
    /// URLs. Differs from `repo` when the source resolved a renamed or
    /// differently-cased name.
    pub stored_as: String,
    pub mode: SyncMode,
    /// Raw records fetched from the source.
    pub fetched: usize,
    /// Events written to the store.
    pub inserted: u64,
    /// Records dropped because they could not be normalized.
    pub skipped_malformed: usize,
}

impl RepoSyncResult {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// A repository whose sync failed; the orchestration carried on without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSyncFailure {
    pub owner: String,
    pub repo: String,
    pub error: String,
}
