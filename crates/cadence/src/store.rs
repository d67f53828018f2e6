//! Event persistence.
//!
//! The sync engine and the statistics engine only see the [`EventStore`]
//! trait. [`DbEventStore`] persists through sea-orm; [`MemoryEventStore`]
//! keeps everything in process.

mod db;
mod errors;
mod memory;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::event::Event;

pub use db::{DEFAULT_INSERT_CHUNK_SIZE, DbEventStore, insert_many_with_retry};
pub use errors::{Result, StoreError};
pub use memory::MemoryEventStore;

/// Storage operations required by sync and statistics.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Number of stored events for `repo`.
    async fn count_by_repo(&self, repo: &str) -> Result<u64>;

    /// Ids of every stored event for `repo`.
    async fn event_ids(&self, repo: &str) -> Result<HashSet<i64>>;

    /// All stored events whose repository is one of `repos`, oldest first.
    async fn find_by_repos(&self, repos: &[String]) -> Result<Vec<Event>>;

    /// Append `events`, returning how many were written.
    async fn insert_many(&self, events: &[Event]) -> Result<u64>;
}

/// Order events by creation time, breaking ties by id.
pub(crate) fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}
