//! Backfill or incremental sync of one repository.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use super::error::SyncError;
use super::paginate::{fetch_all_pages, fetch_until_seen};
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{RepoSyncResult, SyncMode, SyncOptions};
use crate::event::Event;
use crate::normalize::normalize_batch;
use crate::source::EventSource;
use crate::store::EventStore;

/// Sync `owner/repo` into `store`.
///
/// A repository with no stored events is backfilled from every available
/// page. Otherwise only the newest pages are fetched (see
/// [`fetch_until_seen`]) and events whose id is already stored are dropped.
/// Nothing is written when there is nothing new.
pub async fn sync_repository(
    source: &Arc<dyn EventSource>,
    store: &dyn EventStore,
    owner: &str,
    repo: &str,
    options: &SyncOptions,
    on_progress: Option<&ProgressCallback>,
) -> Result<RepoSyncResult, SyncError> {
    let exists = store.count_by_repo(repo).await? > 0;
    let mode = if exists {
        SyncMode::Incremental
    } else {
        SyncMode::Backfill
    };

    emit(
        on_progress,
        SyncProgress::RepoStarted {
            owner: owner.to_string(),
            repo: repo.to_string(),
            mode,
        },
    );

    let (raw, stored_ids) = match mode {
        SyncMode::Backfill => {
            let raw = fetch_all_pages(source, owner, repo, options, on_progress).await?;
            (raw, HashSet::new())
        }
        SyncMode::Incremental => {
            let stored_ids = store.event_ids(repo).await?;
            let raw = fetch_until_seen(
                source,
                owner,
                repo,
                &stored_ids,
                options.max_incremental_pages,
                on_progress,
            )
            .await?;
            (raw, stored_ids)
        }
    };

    emit(
        on_progress,
        SyncProgress::FetchComplete {
            owner: owner.to_string(),
            repo: repo.to_string(),
            total: raw.len(),
        },
    );

    let batch = normalize_batch(&raw);

    // Events are keyed by the name in their source URL, which can differ from
    // the requested one (case, renames). Dedup against every stored name.
    let mut stored_ids = stored_ids;
    let names: BTreeSet<&str> = batch.events.iter().map(|e| e.repo.as_str()).collect();
    for name in names.iter().filter(|name| **name != repo) {
        stored_ids.extend(store.event_ids(name).await?);
    }
    let stored_as = stored_name(&batch.events).unwrap_or(repo).to_string();
    if stored_as != repo {
        tracing::info!(
            owner,
            repo,
            stored_as = %stored_as,
            "Source reports a different repository name"
        );
    }

    let new_events = filter_new_events(batch.events, &stored_ids);

    let inserted = if new_events.is_empty() {
        tracing::debug!(owner, repo, %mode, "No new events");
        0
    } else {
        store.insert_many(&new_events).await?
    };

    emit(
        on_progress,
        SyncProgress::Persisted {
            owner: owner.to_string(),
            repo: repo.to_string(),
            inserted,
            skipped_malformed: batch.skipped,
        },
    );

    tracing::info!(
        owner,
        repo,
        %mode,
        fetched = raw.len(),
        inserted,
        skipped = batch.skipped,
        "Repository sync complete"
    );

    Ok(RepoSyncResult {
        owner: owner.to_string(),
        repo: repo.to_string(),
        stored_as,
        mode,
        fetched: raw.len(),
        inserted,
        skipped_malformed: batch.skipped,
    })
}

/// Most frequent repository name in `events`, ties broken by first
/// occurrence.
fn stored_name(events: &[Event]) -> Option<&str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for event in events {
        match counts.iter_mut().find(|(name, _)| *name == event.repo) {
            Some((_, n)) => *n += 1,
            None => counts.push((event.repo.as_str(), 1)),
        }
    }
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, n)| *n)
        .map(|(name, _)| name)
}

/// Keep events whose id is neither stored nor seen earlier in `events`,
/// preserving order.
pub fn filter_new_events(events: Vec<Event>, stored_ids: &HashSet<i64>) -> Vec<Event> {
    let mut taken = HashSet::with_capacity(events.len());
    events
        .into_iter()
        .filter(|e| !stored_ids.contains(&e.id) && taken.insert(e.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::{FakeEventSource, raw_event};
    use crate::source::{RawEvent, SourceError};
    use crate::store::MemoryEventStore;
    use chrono::{TimeZone, Utc};

    fn raw(id: i64) -> RawEvent {
        raw_event(
            id,
            "PushEvent",
            &format!("2023-01-01T00:00:{:02}Z", id % 60),
            "mongodb",
            "mongo",
        )
    }

    fn stored(id: i64) -> Event {
        Event::new(
            id,
            "PushEvent",
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, (id % 60) as u32).unwrap(),
            "mongo",
        )
    }

    #[test]
    fn filter_new_events_keeps_order_and_dedups_within_batch() {
        let events = vec![stored(12), stored(11), stored(12), stored(10)];
        let kept = filter_new_events(events, &HashSet::from([10]));
        assert_eq!(kept.iter().map(|e| e.id).collect::<Vec<_>>(), vec![12, 11]);
    }

    #[tokio::test]
    async fn empty_store_backfills_every_event() {
        let source: Arc<dyn EventSource> = Arc::new(FakeEventSource::new().with_pages(
            "mongodb",
            "mongo",
            vec![vec![raw(3), raw(2), raw(1)]],
        ));
        let store = MemoryEventStore::new();

        let result = sync_repository(
            &source,
            &store,
            "mongodb",
            "mongo",
            &SyncOptions::default(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.mode, SyncMode::Backfill);
        assert_eq!(result.fetched, 3);
        assert_eq!(result.inserted, 3);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn incremental_sync_writes_only_unseen_ids() {
        let source: Arc<dyn EventSource> = Arc::new(FakeEventSource::new().with_pages(
            "mongodb",
            "mongo",
            vec![vec![raw(12), raw(11), raw(10), raw(9), raw(8)]],
        ));
        let store = MemoryEventStore::with_events((1..=10).map(stored));

        let result = sync_repository(
            &source,
            &store,
            "mongodb",
            "mongo",
            &SyncOptions::default(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.mode, SyncMode::Incremental);
        assert_eq!(result.inserted, 2);
        let mut ids: Vec<i64> = store.snapshot().await.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn second_run_without_upstream_change_inserts_nothing() {
        let source: Arc<dyn EventSource> = Arc::new(FakeEventSource::new().with_pages(
            "mongodb",
            "mongo",
            vec![vec![raw(2), raw(1)]],
        ));
        let store = MemoryEventStore::new();
        let options = SyncOptions::default();

        let first = sync_repository(&source, &store, "mongodb", "mongo", &options, None)
            .await
            .unwrap();
        let second = sync_repository(&source, &store, "mongodb", "mongo", &options, None)
            .await
            .unwrap();

        assert_eq!(first.inserted, 2);
        assert_eq!(second.mode, SyncMode::Incremental);
        assert_eq!(second.inserted, 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn differently_cased_request_does_not_duplicate() {
        // The source answers for "Mongo" with events whose URL names "mongo".
        let source: Arc<dyn EventSource> = Arc::new(FakeEventSource::new().with_pages(
            "mongodb",
            "Mongo",
            vec![vec![raw(2), raw(1)]],
        ));
        let store = MemoryEventStore::new();
        let options = SyncOptions::default();

        let first = sync_repository(&source, &store, "mongodb", "Mongo", &options, None)
            .await
            .unwrap();
        let second = sync_repository(&source, &store, "mongodb", "Mongo", &options, None)
            .await
            .unwrap();

        assert_eq!(first.inserted, 2);
        assert_eq!(first.stored_as, "mongo");
        assert_eq!(second.inserted, 0);
        assert_eq!(second.stored_as, "mongo");
        assert_eq!(store.len().await, 2);
        assert_eq!(store.count_by_repo("mongo").await.unwrap(), 2);
    }

    #[test]
    fn stored_name_prefers_the_majority() {
        let mut renamed = stored(3);
        renamed.repo = "old-mongo".to_string();
        assert_eq!(stored_name(&[renamed, stored(2), stored(1)]), Some("mongo"));
        assert_eq!(stored_name(&[]), None);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_and_counted() {
        let mut broken = raw(5);
        broken.created_at = Some("not a time".to_string());
        let source: Arc<dyn EventSource> = Arc::new(FakeEventSource::new().with_pages(
            "mongodb",
            "mongo",
            vec![vec![raw(6), broken, raw(4)]],
        ));
        let store = MemoryEventStore::new();

        let result = sync_repository(
            &source,
            &store,
            "mongodb",
            "mongo",
            &SyncOptions::default(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.inserted, 2);
        assert_eq!(result.skipped_malformed, 1);
    }

    #[tokio::test]
    async fn retrieval_failure_writes_nothing() {
        let source: Arc<dyn EventSource> = Arc::new(
            FakeEventSource::new()
                .with_pages("mongodb", "mongo", vec![vec![raw(1)]])
                .failing_at("mongodb", "mongo", 1, 404),
        );
        let store = MemoryEventStore::new();

        let err = sync_repository(
            &source,
            &store,
            "mongodb",
            "mongo",
            &SyncOptions::default(),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Source(SourceError::Status { status: 404, .. })
        ));
        assert!(store.is_empty().await);
    }
}
