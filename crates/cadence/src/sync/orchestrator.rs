//! Multi-repository sync followed by one statistics pass.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{ActivityError, PreconditionError};
use super::incremental::sync_repository;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{MAX_REPO_PAIRS, RepoSyncFailure, RepoSyncResult, SyncOptions};
use crate::source::{EventSource, short_error_message};
use crate::stats::{RollingStats, RollingStatsEngine, StatsWindow};
use crate::store::EventStore;

/// Owners and repositories paired positionally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRepoRequest {
    pub owners: Vec<String>,
    pub repos: Vec<String>,
}

impl OwnerRepoRequest {
    pub fn new(owners: Vec<String>, repos: Vec<String>) -> Self {
        Self { owners, repos }
    }

    /// Build a request from `owner/repo` strings.
    pub fn from_full_names<I, S>(names: I) -> Result<Self, PreconditionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut request = Self::default();
        for name in names {
            let name = name.as_ref();
            let (owner, repo) = name
                .split_once('/')
                .ok_or_else(|| PreconditionError::InvalidName {
                    field: "owner/repo",
                    value: name.to_string(),
                })?;
            request.owners.push(owner.to_string());
            request.repos.push(repo.to_string());
        }
        Ok(request)
    }

    /// Validate and return the `(owner, repo)` pairs.
    pub fn pairs(&self) -> Result<Vec<(String, String)>, PreconditionError> {
        if self.owners.len() != self.repos.len() {
            return Err(PreconditionError::MismatchedPairs {
                owners: self.owners.len(),
                repos: self.repos.len(),
            });
        }
        if self.owners.len() > MAX_REPO_PAIRS {
            return Err(PreconditionError::TooManyPairs(self.owners.len()));
        }

        self.owners
            .iter()
            .zip(&self.repos)
            .map(|(owner, repo)| {
                let owner = validate_name("owner", owner)?;
                let repo = validate_name("repo", repo)?;
                Ok((owner, repo))
            })
            .collect()
    }
}

fn validate_name(field: &'static str, value: &str) -> Result<String, PreconditionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '?', '#', ' ']) {
        return Err(PreconditionError::InvalidName {
            field,
            value: value.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Statistics plus a per-repository account of the sync that preceded them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub stats: RollingStats,
    pub synced: Vec<RepoSyncResult>,
    pub failures: Vec<RepoSyncFailure>,
}

/// Runs repository syncs in sequence, then computes statistics once.
#[derive(Clone)]
pub struct SyncOrchestrator {
    source: Arc<dyn EventSource>,
    store: Arc<dyn EventStore>,
    stats: RollingStatsEngine,
    options: SyncOptions,
}

impl SyncOrchestrator {
    pub fn new(source: Arc<dyn EventSource>, store: Arc<dyn EventStore>) -> Self {
        let stats = RollingStatsEngine::new(Arc::clone(&store), StatsWindow::default());
        Self {
            source,
            store,
            stats,
            options: SyncOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_stats_window(mut self, window: StatsWindow) -> Self {
        self.stats = RollingStatsEngine::new(Arc::clone(&self.store), window);
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Sync every requested repository, then compute statistics over all of
    /// them.
    ///
    /// A repository whose sync fails is logged and recorded in
    /// [`ActivityReport::failures`]; the remaining repositories still run and
    /// statistics are computed from whatever is stored.
    ///
    /// # Errors
    /// Returns [`ActivityError::Precondition`] before any network or store call
    /// when the request is invalid, and [`ActivityError::Store`] when the
    /// statistics cannot be read.
    pub async fn run(
        &self,
        request: &OwnerRepoRequest,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<ActivityReport, ActivityError> {
        let pairs = request.pairs()?;

        emit(on_progress, SyncProgress::SyncingRepos { count: pairs.len() });

        let mut report = ActivityReport::default();
        let mut stat_repos: Vec<String> = Vec::with_capacity(pairs.len());
        for (owner, repo) in &pairs {
            match sync_repository(
                &self.source,
                self.store.as_ref(),
                owner,
                repo,
                &self.options,
                on_progress,
            )
            .await
            {
                Ok(result) => {
                    stat_repos.push(result.stored_as.clone());
                    report.synced.push(result);
                }
                Err(e) => {
                    stat_repos.push(repo.clone());
                    let error = short_error_message(&e);
                    tracing::warn!(
                        owner = %owner,
                        repo = %repo,
                        error = %error,
                        "Repository sync failed"
                    );
                    emit(
                        on_progress,
                        SyncProgress::RepoFailed {
                            owner: owner.clone(),
                            repo: repo.clone(),
                            error: error.clone(),
                        },
                    );
                    report.failures.push(RepoSyncFailure {
                        owner: owner.clone(),
                        repo: repo.clone(),
                        error,
                    });
                }
            }
        }

        emit(
            on_progress,
            SyncProgress::SyncReposComplete {
                successful: report.synced.len(),
                failed: report.failures.len(),
            },
        );

        let mut seen = HashSet::new();
        stat_repos.retain(|repo| seen.insert(repo.clone()));
        emit(
            on_progress,
            SyncProgress::ComputingStats {
                repos: stat_repos.len(),
            },
        );
        report.stats = self.stats.compute_stats(&stat_repos).await?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::{FakeEventSource, raw_event};
    use crate::store::MemoryEventStore;
    use chrono::{DateTime, Duration, Utc};

    fn base() -> DateTime<Utc> {
        Utc::now() - Duration::minutes(5)
    }

    fn at(id: i64, created: DateTime<Utc>, owner: &str, repo: &str) -> crate::source::RawEvent {
        let created = created.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        raw_event(id, "PushEvent", &created, owner, repo)
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("name{i}")).collect()
    }

    #[test]
    fn pairs_rejects_more_than_five() {
        let request = OwnerRepoRequest::new(names(6), names(6));
        assert_eq!(request.pairs(), Err(PreconditionError::TooManyPairs(6)));
        assert_eq!(OwnerRepoRequest::new(names(5), names(5)).pairs().unwrap().len(), 5);
    }

    #[test]
    fn pairs_rejects_mismatched_lengths_and_bad_names() {
        let request = OwnerRepoRequest::new(names(2), names(1));
        assert_eq!(
            request.pairs(),
            Err(PreconditionError::MismatchedPairs { owners: 2, repos: 1 })
        );

        let request = OwnerRepoRequest::new(vec!["a/b".to_string()], vec!["c".to_string()]);
        assert!(matches!(
            request.pairs(),
            Err(PreconditionError::InvalidName { field: "owner", .. })
        ));
    }

    #[test]
    fn from_full_names_splits_owner_and_repo() {
        let request = OwnerRepoRequest::from_full_names(["mongodb/mongo", "rust-lang/rust"]).unwrap();
        assert_eq!(request.owners, vec!["mongodb", "rust-lang"]);
        assert_eq!(request.repos, vec!["mongo", "rust"]);
        assert!(OwnerRepoRequest::from_full_names(["nope"]).is_err());
    }

    #[tokio::test]
    async fn six_pairs_are_rejected_before_any_fetch() {
        let fake = Arc::new(FakeEventSource::new());
        let store = Arc::new(MemoryEventStore::new());
        let orchestrator = SyncOrchestrator::new(fake.clone(), store);

        let err = orchestrator
            .run(&OwnerRepoRequest::new(names(6), names(6)), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ActivityError::Precondition(PreconditionError::TooManyPairs(6))
        ));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn failing_repository_does_not_block_the_rest() {
        let base = base();
        let fake = Arc::new(
            FakeEventSource::new()
                .with_pages("o", "broken", vec![vec![at(1, base, "o", "broken")]])
                .failing_at("o", "broken", 1, 404)
                .with_pages(
                    "o",
                    "ok",
                    vec![vec![
                        at(3, base + Duration::seconds(60), "o", "ok"),
                        at(2, base, "o", "ok"),
                    ]],
                ),
        );
        let store = Arc::new(MemoryEventStore::new());
        let orchestrator = SyncOrchestrator::new(fake.clone(), store.clone());

        let request = OwnerRepoRequest::new(
            vec!["o".to_string(), "o".to_string()],
            vec!["broken".to_string(), "ok".to_string()],
        );
        let report = orchestrator.run(&request, None).await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].repo, "broken");
        assert!(report.failures[0].error.contains("404"));
        assert_eq!(report.synced.len(), 1);
        assert_eq!(report.synced[0].inserted, 2);
        assert_eq!(report.stats.mean_repo["ok"], 30.0);
        assert!(!report.stats.mean_repo.contains_key("broken"));
    }

    #[tokio::test]
    async fn stats_use_the_name_events_are_stored_under() {
        let base = base();
        let fake = Arc::new(FakeEventSource::new().with_pages(
            "mongodb",
            "Mongo",
            vec![vec![
                at(2, base + Duration::seconds(40), "mongodb", "mongo"),
                at(1, base, "mongodb", "mongo"),
            ]],
        ));
        let store = Arc::new(MemoryEventStore::new());
        let orchestrator = SyncOrchestrator::new(fake, store.clone());
        let request = OwnerRepoRequest::new(vec!["mongodb".to_string()], vec!["Mongo".to_string()]);

        let first = orchestrator.run(&request, None).await.unwrap();
        let second = orchestrator.run(&request, None).await.unwrap();

        assert_eq!(first.stats.mean_repo["mongo"], 20.0);
        assert_eq!(second.synced[0].inserted, 0);
        assert_eq!(second.stats.mean_repo["mongo"], 20.0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn repositories_sync_in_request_order() {
        let base = base();
        let fake = Arc::new(
            FakeEventSource::new()
                .with_pages("a", "one", vec![vec![at(1, base, "a", "one")]])
                .with_pages("b", "two", vec![vec![at(2, base, "b", "two")]]),
        );
        let orchestrator = SyncOrchestrator::new(fake.clone(), Arc::new(MemoryEventStore::new()));

        let request = OwnerRepoRequest::new(
            vec!["a".to_string(), "b".to_string()],
            vec!["one".to_string(), "two".to_string()],
        );
        let report = orchestrator.run(&request, None).await.unwrap();

        let order: Vec<String> = fake.calls().into_iter().map(|(name, _)| name).collect();
        assert_eq!(order, vec!["a/one", "b/two"]);
        assert_eq!(
            report.synced.iter().map(RepoSyncResult::full_name).collect::<Vec<_>>(),
            vec!["a/one", "b/two"]
        );
    }
}
