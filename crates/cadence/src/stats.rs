//! Rolling time-between-events statistics.
//!
//! Stored events are cut to a trailing window (7 days by default), capped to
//! the most recent 500, then grouped. Within each group the gap to the
//! previous event is measured in whole seconds, with the first event of a
//! group counting as zero. Each group reports the mean gap.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::store::{self, EventStore};

/// Default trailing window length in days.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Default cap on events considered after windowing.
pub const DEFAULT_MAX_EVENTS: usize = 500;

/// Trailing window and event cap applied before grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsWindow {
    pub length: Duration,
    pub max_events: usize,
}

impl StatsWindow {
    pub fn new(length: Duration, max_events: usize) -> Self {
        Self { length, max_events }
    }

    pub fn days(days: i64, max_events: usize) -> Self {
        Self::new(Duration::days(days), max_events)
    }
}

impl Default for StatsWindow {
    fn default() -> Self {
        Self::days(DEFAULT_WINDOW_DAYS, DEFAULT_MAX_EVENTS)
    }
}

/// How events are partitioned before gaps are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Repo,
    Type,
    RepoType,
}

/// Identity of one group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub repo: Option<String>,
    pub event_type: Option<String>,
}

impl Grouping {
    fn key(self, event: &Event) -> GroupKey {
        let repo = Some(event.repo.clone());
        let event_type = Some(event.event_type.clone());
        match self {
            Self::Repo => GroupKey {
                repo,
                event_type: None,
            },
            Self::Type => GroupKey {
                repo: None,
                event_type,
            },
            Self::RepoType => GroupKey { repo, event_type },
        }
    }
}

/// Mean inter-event gap per group, keyed by group value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub mean_repo: BTreeMap<String, f64>,
    pub mean_type: BTreeMap<String, f64>,
    pub mean_repo_type: BTreeMap<String, BTreeMap<String, f64>>,
}

impl RollingStats {
    /// Compute all three groupings over `events` as of `now`.
    pub fn from_events(events: &[Event], now: DateTime<Utc>, window: StatsWindow) -> Self {
        let windowed = window_events(events, now, window);

        let mean_repo = mean_gaps(&windowed, Grouping::Repo)
            .into_iter()
            .filter_map(|(key, mean)| Some((key.repo?, mean)))
            .collect();

        let mean_type = mean_gaps(&windowed, Grouping::Type)
            .into_iter()
            .filter_map(|(key, mean)| Some((key.event_type?, mean)))
            .collect();

        let mut mean_repo_type: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for (key, mean) in mean_gaps(&windowed, Grouping::RepoType) {
            if let (Some(repo), Some(event_type)) = (key.repo, key.event_type) {
                mean_repo_type
                    .entry(repo)
                    .or_default()
                    .insert(event_type, mean);
            }
        }

        Self {
            mean_repo,
            mean_type,
            mean_repo_type,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mean_repo.is_empty()
    }
}

/// Events inside the trailing window, oldest first, capped to the most
/// recent `window.max_events`.
pub fn window_events(events: &[Event], now: DateTime<Utc>, window: StatsWindow) -> Vec<Event> {
    let cutoff = now - window.length;
    let mut kept: Vec<Event> = events
        .iter()
        .filter(|e| e.created_at >= cutoff)
        .cloned()
        .collect();
    store::sort_events(&mut kept);

    let excess = kept.len().saturating_sub(window.max_events);
    kept.drain(..excess);
    kept
}

/// Mean gap in whole seconds per group of already windowed, sorted events.
fn mean_gaps(events: &[Event], grouping: Grouping) -> BTreeMap<GroupKey, f64> {
    let mut groups: BTreeMap<GroupKey, (DateTime<Utc>, i64, usize)> = BTreeMap::new();

    for event in events {
        let key = grouping.key(event);
        match groups.get_mut(&key) {
            Some((previous, total, count)) => {
                *total += (event.created_at - *previous).num_seconds();
                *count += 1;
                *previous = event.created_at;
            }
            None => {
                groups.insert(key, (event.created_at, 0, 1));
            }
        }
    }

    groups
        .into_iter()
        .map(|(key, (_, total, count))| (key, total as f64 / count as f64))
        .collect()
}

/// Window, cap and group `events`, returning the mean gap per group.
pub fn rolling_means(
    events: &[Event],
    grouping: Grouping,
    now: DateTime<Utc>,
    window: StatsWindow,
) -> BTreeMap<GroupKey, f64> {
    mean_gaps(&window_events(events, now, window), grouping)
}

/// Computes [`RollingStats`] from an [`EventStore`].
#[derive(Clone)]
pub struct RollingStatsEngine {
    store: Arc<dyn EventStore>,
    window: StatsWindow,
}

impl RollingStatsEngine {
    pub fn new(store: Arc<dyn EventStore>, window: StatsWindow) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> StatsWindow {
        self.window
    }

    /// Statistics over the stored events of `repos` as of now.
    pub async fn compute_stats(&self, repos: &[String]) -> store::Result<RollingStats> {
        self.compute_stats_at(repos, Utc::now()).await
    }

    pub async fn compute_stats_at(
        &self,
        repos: &[String],
        now: DateTime<Utc>,
    ) -> store::Result<RollingStats> {
        let events = self.store.find_by_repos(repos).await?;
        let stats = RollingStats::from_events(&events, now, self.window);
        tracing::debug!(
            repos = repos.len(),
            events = events.len(),
            groups = stats.mean_repo_type.values().map(BTreeMap::len).sum::<usize>(),
            "Computed rolling statistics"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEventStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn at(id: i64, ty: &str, repo: &str, seconds_before_now: f64) -> Event {
        let offset = Duration::milliseconds((seconds_before_now * 1000.0) as i64);
        Event::new(id, ty, now() - offset, repo)
    }

    fn repo_key(repo: &str) -> GroupKey {
        GroupKey {
            repo: Some(repo.to_string()),
            event_type: None,
        }
    }

    #[test]
    fn sub_second_gaps_truncate() {
        let events = vec![at(1, "PushEvent", "a", 200.5), at(2, "PushEvent", "a", 80.0)];

        let means = rolling_means(&events, Grouping::Repo, now(), StatsWindow::default());
        assert_eq!(means[&repo_key("a")], 60.0);
    }

    #[test]
    fn first_event_of_each_group_is_zero() {
        let events = vec![at(1, "PushEvent", "a", 100.0), at(2, "PushEvent", "b", 50.0)];

        let means = rolling_means(&events, Grouping::Repo, now(), StatsWindow::default());
        assert_eq!(means[&repo_key("a")], 0.0);
        assert_eq!(means[&repo_key("b")], 0.0);
    }

    #[test]
    fn events_outside_window_are_ignored() {
        let eight_days = 8.0 * 24.0 * 3600.0;
        let events = vec![
            at(1, "PushEvent", "a", eight_days),
            at(2, "PushEvent", "a", 30.0),
            at(3, "PushEvent", "a", 10.0),
        ];

        let windowed = window_events(&events, now(), StatsWindow::default());
        assert_eq!(windowed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 3]);

        let means = rolling_means(&events, Grouping::Repo, now(), StatsWindow::default());
        assert_eq!(means[&repo_key("a")], 10.0);
    }

    #[test]
    fn cap_discards_oldest_events() {
        let events: Vec<Event> = (0..10)
            .map(|i| at(i, "PushEvent", "a", (100 - i) as f64))
            .collect();

        let windowed = window_events(&events, now(), StatsWindow::days(7, 4));
        assert_eq!(
            windowed.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![6, 7, 8, 9]
        );
    }

    #[test]
    fn unsorted_input_is_ordered_before_gaps() {
        let events = vec![
            at(3, "PushEvent", "a", 0.0),
            at(1, "PushEvent", "a", 20.0),
            at(2, "PushEvent", "a", 10.0),
        ];

        let means = rolling_means(&events, Grouping::Repo, now(), StatsWindow::default());
        assert_eq!(means[&repo_key("a")], 20.0 / 3.0);
    }

    #[test]
    fn stats_are_keyed_by_group_value() {
        let events = vec![
            at(1, "PushEvent", "mongo", 300.0),
            at(2, "IssuesEvent", "mongo", 200.0),
            at(3, "PushEvent", "mongo", 100.0),
            at(4, "PushEvent", "rust", 50.0),
        ];

        let stats = RollingStats::from_events(&events, now(), StatsWindow::default());

        assert_eq!(stats.mean_repo["mongo"], 200.0 / 3.0);
        assert_eq!(stats.mean_repo["rust"], 0.0);
        assert_eq!(stats.mean_type["PushEvent"], (0.0 + 200.0 + 50.0) / 3.0);
        assert_eq!(stats.mean_type["IssuesEvent"], 0.0);
        assert_eq!(stats.mean_repo_type["mongo"]["PushEvent"], 100.0);
        assert_eq!(stats.mean_repo_type["rust"]["PushEvent"], 0.0);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["mean_repo_type"]["mongo"]["IssuesEvent"], 0.0);
    }

    #[test]
    fn no_events_yield_empty_maps() {
        let stats = RollingStats::from_events(&[], now(), StatsWindow::default());
        assert!(stats.is_empty());
        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            serde_json::json!({"mean_repo": {}, "mean_type": {}, "mean_repo_type": {}})
        );
    }

    #[tokio::test]
    async fn engine_reads_requested_repos_only() {
        let store = Arc::new(MemoryEventStore::with_events([
            at(1, "PushEvent", "mongo", 120.0),
            at(2, "PushEvent", "mongo", 0.0),
            at(3, "PushEvent", "other", 60.0),
        ]));
        let engine = RollingStatsEngine::new(store, StatsWindow::default());

        let stats = engine
            .compute_stats_at(&["mongo".to_string()], now())
            .await
            .unwrap();

        assert_eq!(stats.mean_repo.len(), 1);
        assert_eq!(stats.mean_repo["mongo"], 60.0);
    }
}
