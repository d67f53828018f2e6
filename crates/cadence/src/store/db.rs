//! sea-orm backed event store.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};

use super::errors::{Result, StoreError};
use super::EventStore;
use crate::entity::event::{Column, Entity as EventEntity};
use crate::event::Event;
use crate::retry::{RetryConfig, with_retry};

/// Maximum rows per `INSERT` statement.
///
/// Keeps the bound-parameter count well under SQLite's limit.
pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 500;

/// Event store backed by a sea-orm connection (SQLite or PostgreSQL).
#[derive(Debug, Clone)]
pub struct DbEventStore {
    db: Arc<DatabaseConnection>,
    retry: RetryConfig,
}

impl DbEventStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db: Arc::new(db),
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy used for inserts.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl EventStore for DbEventStore {
    async fn count_by_repo(&self, repo: &str) -> Result<u64> {
        let count = EventEntity::find()
            .filter(Column::Repo.eq(repo))
            .count(&*self.db)
            .await?;
        Ok(count)
    }

    async fn event_ids(&self, repo: &str) -> Result<HashSet<i64>> {
        let ids: Vec<i64> = EventEntity::find()
            .select_only()
            .column(Column::EventId)
            .filter(Column::Repo.eq(repo))
            .into_tuple()
            .all(&*self.db)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn find_by_repos(&self, repos: &[String]) -> Result<Vec<Event>> {
        if repos.is_empty() {
            return Ok(Vec::new());
        }

        let models = EventEntity::find()
            .filter(Column::Repo.is_in(repos.iter().cloned()))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::EventId)
            .all(&*self.db)
            .await?;
        Ok(models.into_iter().map(Event::from).collect())
    }

    async fn insert_many(&self, events: &[Event]) -> Result<u64> {
        insert_many_with_retry(&*self.db, events, &self.retry).await
    }
}

/// Insert `events` in one transaction, chunked by [`DEFAULT_INSERT_CHUNK_SIZE`].
///
/// # Errors
/// Returns `StoreError::Database` if any chunk fails; nothing is committed in
/// that case.
pub async fn insert_chunked<C>(db: &C, events: &[Event]) -> Result<u64>
where
    C: ConnectionTrait + TransactionTrait,
{
    if events.is_empty() {
        return Ok(0);
    }

    let fetched_at = Utc::now();
    let txn = db.begin().await?;
    for chunk in events.chunks(DEFAULT_INSERT_CHUNK_SIZE) {
        let models = chunk.iter().map(|e| e.to_active_model(fetched_at));
        EventEntity::insert_many(models)
            .exec_without_returning(&txn)
            .await?;
    }
    txn.commit().await?;

    Ok(events.len() as u64)
}

/// Insert with retries on transient database errors (locked, busy, dropped
/// connection) using exponential backoff.
pub async fn insert_many_with_retry<C>(db: &C, events: &[Event], retry: &RetryConfig) -> Result<u64>
where
    C: ConnectionTrait + TransactionTrait,
{
    if events.is_empty() {
        return Ok(0);
    }

    tracing::debug!(count = events.len(), "Inserting events");
    with_retry(
        || insert_chunked(db, events),
        StoreError::is_transient,
        retry,
        "insert events",
    )
    .await
}
