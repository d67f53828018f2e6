use cadence::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
#[derive(Debug, Default)]
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::SyncingRepos { count } => {
                tracing::info!(count, "Syncing repositories");
            }

            SyncProgress::RepoStarted { owner, repo, mode } => {
                tracing::info!(repo = %format!("{}/{}", owner, repo), %mode, "Sync started");
            }

            SyncProgress::FetchedPage {
                owner,
                repo,
                page,
                count,
                total_so_far,
                expected_pages,
            } => {
                tracing::debug!(
                    repo = %format!("{}/{}", owner, repo),
                    page,
                    count,
                    total_so_far,
                    expected_pages = ?expected_pages,
                    "Fetched page"
                );
            }

            SyncProgress::FetchComplete { owner, repo, total } => {
                tracing::info!(repo = %format!("{}/{}", owner, repo), total, "Fetch complete");
            }

            SyncProgress::Persisted {
                owner,
                repo,
                inserted,
                skipped_malformed,
            } => {
                if skipped_malformed > 0 {
                    tracing::warn!(
                        repo = %format!("{}/{}", owner, repo),
                        inserted,
                        skipped_malformed,
                        "Saved with malformed records skipped"
                    );
                } else {
                    tracing::info!(repo = %format!("{}/{}", owner, repo), inserted, "Saved to database");
                }
            }

            SyncProgress::RepoFailed { owner, repo, error } => {
                tracing::error!(repo = %format!("{}/{}", owner, repo), error = %error, "Sync failed");
            }

            SyncProgress::SyncReposComplete { successful, failed } => {
                tracing::info!(successful, failed, "Sync complete");
            }

            SyncProgress::ComputingStats { repos } => {
                tracing::debug!(repos, "Computing rolling statistics");
            }

            _ => {}
        }
    }
}
