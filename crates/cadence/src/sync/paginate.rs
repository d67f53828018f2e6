//! Page discovery and fetching for a repository's event feed.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::SyncOptions;
use crate::source::{EventPage, EventSource, RawEvent, Result, SourceError};

/// Fetch every page of `owner/repo` events.
///
/// Page 1 is fetched first to learn the last page from its `Link` header.
/// Pages `2..=last` are then fetched with at most
/// `options.page_concurrency` requests in flight. The flattened result keeps
/// the API's newest-first order. Any failed page fails the whole call.
pub async fn fetch_all_pages(
    source: &Arc<dyn EventSource>,
    owner: &str,
    repo: &str,
    options: &SyncOptions,
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<RawEvent>> {
    let first = source.fetch_page(owner, repo, 1).await?;
    let last_page = first.last_page();
    let expected_pages = Some(last_page);
    let mut total_so_far = first.events.len();

    emit(
        on_progress,
        SyncProgress::FetchedPage {
            owner: owner.to_string(),
            repo: repo.to_string(),
            page: 1,
            count: first.events.len(),
            total_so_far,
            expected_pages,
        },
    );

    if last_page <= 1 {
        return Ok(first.events);
    }

    tracing::debug!(owner, repo, last_page, "Fetching remaining event pages");

    let concurrency = options.page_concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut join_set: JoinSet<Result<EventPage>> = JoinSet::new();

    for page in 2..=last_page {
        join_set.spawn(fetch_page_with_permit(
            Arc::clone(source),
            Arc::clone(&semaphore),
            owner.to_string(),
            repo.to_string(),
            page,
        ));
    }

    let mut pages: BTreeMap<u32, Vec<RawEvent>> = BTreeMap::new();
    pages.insert(1, first.events);

    while let Some(joined) = join_set.join_next().await {
        let fetched = match joined {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                join_set.abort_all();
                return Err(e);
            }
            Err(e) => {
                join_set.abort_all();
                return Err(SourceError::internal(format!("page fetch task failed: {e}")));
            }
        };

        total_so_far += fetched.events.len();
        emit(
            on_progress,
            SyncProgress::FetchedPage {
                owner: owner.to_string(),
                repo: repo.to_string(),
                page: fetched.page,
                count: fetched.events.len(),
                total_so_far,
                expected_pages,
            },
        );
        pages.insert(fetched.page, fetched.events);
    }

    Ok(pages.into_values().flatten().collect())
}

async fn fetch_page_with_permit(
    source: Arc<dyn EventSource>,
    semaphore: Arc<Semaphore>,
    owner: String,
    repo: String,
    page: u32,
) -> Result<EventPage> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|_| SourceError::internal("Semaphore closed unexpectedly"))?;
    source.fetch_page(&owner, &repo, page).await
}

/// Fetch newest pages until one contains an id from `seen_ids`.
///
/// Stops after the page holding a seen id, at the last page, on an empty
/// page, or after `max_pages` pages (at least one page is always fetched).
pub async fn fetch_until_seen(
    source: &Arc<dyn EventSource>,
    owner: &str,
    repo: &str,
    seen_ids: &HashSet<i64>,
    max_pages: u32,
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<RawEvent>> {
    let max_pages = max_pages.max(1);
    let mut events = Vec::new();
    let mut page = 1u32;

    loop {
        let fetched = source.fetch_page(owner, repo, page).await?;
        let last_page = fetched.last_page();
        let count = fetched.events.len();
        let reached_seen = fetched
            .events
            .iter()
            .filter_map(RawEvent::event_id)
            .any(|id| seen_ids.contains(&id));

        events.extend(fetched.events);
        emit(
            on_progress,
            SyncProgress::FetchedPage {
                owner: owner.to_string(),
                repo: repo.to_string(),
                page,
                count,
                total_so_far: events.len(),
                expected_pages: None,
            },
        );

        if reached_seen || count == 0 || page >= last_page || page >= max_pages {
            tracing::debug!(
                owner,
                repo,
                pages = page,
                reached_seen,
                "Incremental fetch stopped"
            );
            return Ok(events);
        }
        page += 1;
    }
}
