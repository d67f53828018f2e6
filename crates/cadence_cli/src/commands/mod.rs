pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod serve;
pub(crate) mod sync;

use std::sync::Arc;

use cadence::source::{ClientConfig, GitHubEventsClient, RateLimitGate};
use cadence::{DbEventStore, EventStore, SyncOrchestrator, connect_and_migrate};

use crate::config::Config;

/// Open the configured database, applying pending migrations.
pub(crate) async fn open_store(
    database_url: &str,
) -> Result<Arc<dyn EventStore>, Box<dyn std::error::Error>> {
    let db = connect_and_migrate(database_url).await?;
    Ok(Arc::new(DbEventStore::new(db)))
}

/// Wire the GitHub client, `store` and the statistics window into an
/// orchestrator.
pub(crate) fn build_orchestrator(
    config: &Config,
    store: Arc<dyn EventStore>,
) -> Result<SyncOrchestrator, Box<dyn std::error::Error>> {
    let client_config = ClientConfig::new(&config.github.base_url, config.github.token.as_deref());
    if !client_config.is_authenticated() {
        tracing::warn!(
            "No GitHub token configured; unauthenticated requests are limited to 60 per hour"
        );
    }
    let gate = Arc::new(RateLimitGate::with_requests_per_second(
        config.github.requests_per_second,
    ));
    let client = GitHubEventsClient::with_reqwest(client_config, gate)?;

    Ok(SyncOrchestrator::new(Arc::new(client), store)
        .with_options(config.sync_options())
        .with_stats_window(config.stats_window()))
}
