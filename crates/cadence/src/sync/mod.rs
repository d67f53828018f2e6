//! Incremental event sync.
//!
//! # Module Structure
//!
//! - [`types`] - Constants, `SyncOptions`, per-repository results
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`paginate`] - Page discovery: `fetch_all_pages()`, `fetch_until_seen()`
//! - [`incremental`] - One repository: `sync_repository()`
//! - [`orchestrator`] - Many repositories plus statistics: `SyncOrchestrator`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cadence::source::{ClientConfig, GitHubEventsClient, RateLimitGate};
//! use cadence::store::MemoryEventStore;
//! use cadence::sync::{OwnerRepoRequest, SyncOrchestrator};
//!
//! let client = GitHubEventsClient::with_reqwest(ClientConfig::default(), Arc::new(RateLimitGate::new()))?;
//! let orchestrator = SyncOrchestrator::new(Arc::new(client), Arc::new(MemoryEventStore::new()));
//! let report = orchestrator
//!     .run(&OwnerRepoRequest::from_full_names(["mongodb/mongo"])?, None)
//!     .await?;
//! println!("{:?}", report.stats.mean_repo);
//! ```

mod error;
pub mod incremental;
pub mod orchestrator;
pub mod paginate;
mod progress;
mod types;

pub use error::{ActivityError, PreconditionError, SyncError};

pub use types::{RepoSyncFailure, RepoSyncResult, SyncMode, SyncOptions};

pub use types::{
    DEFAULT_MAX_INCREMENTAL_PAGES, DEFAULT_PAGE_FETCH_CONCURRENCY, INITIAL_BACKOFF_MS,
    MAX_BACKOFF_MS, MAX_FETCH_RETRIES, MAX_REPO_PAIRS, PAGE_SIZE,
};

pub use progress::{ProgressCallback, SyncProgress, emit};

pub use incremental::{filter_new_events, sync_repository};
pub use orchestrator::{ActivityReport, OwnerRepoRequest, SyncOrchestrator};
pub use paginate::{fetch_all_pages, fetch_until_seen};
