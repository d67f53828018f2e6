//! In-process event store for tests and dry runs.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::errors::Result;
use super::{EventStore, sort_events};
use crate::event::Event;

/// An [`EventStore`] backed by a vector in memory.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `events`.
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            events: RwLock::new(events.into_iter().collect()),
        }
    }

    /// Every stored event in insertion order.
    pub async fn snapshot(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn count_by_repo(&self, repo: &str) -> Result<u64> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|e| e.repo == repo).count() as u64)
    }

    async fn event_ids(&self, repo: &str) -> Result<HashSet<i64>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.repo == repo)
            .map(|e| e.id)
            .collect())
    }

    async fn find_by_repos(&self, repos: &[String]) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        let mut found: Vec<Event> = events
            .iter()
            .filter(|e| repos.contains(&e.repo))
            .cloned()
            .collect();
        sort_events(&mut found);
        Ok(found)
    }

    async fn insert_many(&self, events: &[Event]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }
        self.events.write().await.extend_from_slice(events);
        Ok(events.len() as u64)
    }
}
