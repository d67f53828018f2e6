//! Cadence - incremental repository event sync with rolling activity
//! statistics.
//!
//! Events are pulled from GitHub's per-repository events feed, deduplicated
//! against what is already stored, and summarized as the mean number of
//! seconds between consecutive events per repository, per event type, and
//! per repository and type.
//!
//! # Features
//!
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to automatically run migrations on connection.
//! - `sqlite` (default) / `postgres` - Database backends.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cadence::{connect_and_migrate, DbEventStore, SyncOrchestrator, OwnerRepoRequest};
//! use cadence::source::{ClientConfig, GitHubEventsClient, RateLimitGate};
//!
//! let db = connect_and_migrate("sqlite://cadence.db?mode=rwc").await?;
//! let client = GitHubEventsClient::with_reqwest(ClientConfig::default(), Arc::new(RateLimitGate::new()))?;
//! let orchestrator = SyncOrchestrator::new(Arc::new(client), Arc::new(DbEventStore::new(db)));
//!
//! let request = OwnerRepoRequest::from_full_names(["mongodb/mongo"])?;
//! let report = orchestrator.run(&request, None).await?;
//! ```

pub mod db;
pub mod entity;
pub mod event;
pub mod http;
pub mod normalize;
pub mod retry;
pub mod server;
pub mod source;
pub mod stats;
pub mod store;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use event::Event;
pub use normalize::{NormalizeError, normalize, normalize_batch};
pub use source::{EventSource, GitHubEventsClient, RateLimitGate, SourceError};
pub use stats::{RollingStats, RollingStatsEngine, StatsWindow};
pub use store::{DbEventStore, EventStore, MemoryEventStore, StoreError};
pub use sync::{
    ActivityError, ActivityReport, OwnerRepoRequest, PreconditionError, SyncError, SyncOptions,
    SyncOrchestrator,
};
