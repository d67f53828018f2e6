//! One-shot sync from the command line.
//!
//! Runs the same orchestration as the HTTP endpoint and prints the per-repo
//! outcome alongside the rolling statistics.

use std::sync::Arc;

use clap::ValueEnum;
use tabled::Tabled;

use cadence::{ActivityReport, EventStore, MemoryEventStore, OwnerRepoRequest};
use cadence::sync::{RepoSyncFailure, RepoSyncResult};

use crate::config::Config;
use crate::progress::LoggingReporter;
use crate::shutdown::shutdown_signal;

/// Output format for sync results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as formatted tables (default)
    #[default]
    Table,
    /// Display the full report as JSON
    Json,
}

pub(crate) async fn handle_sync(
    full_names: Vec<String>,
    output: OutputFormat,
    dry_run: bool,
    config: &Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = OwnerRepoRequest::from_full_names(&full_names)?;
    // Reject bad input before touching the database.
    request.pairs()?;

    let store: Arc<dyn EventStore> = if dry_run {
        tracing::info!("Dry run: events are kept in memory and discarded on exit");
        Arc::new(MemoryEventStore::new())
    } else {
        super::open_store(database_url).await?
    };
    let orchestrator = super::build_orchestrator(config, store)?;
    let callback = LoggingReporter::new().into_callback();

    let report = tokio::select! {
        report = orchestrator.run(&request, Some(&callback)) => report?,
        _ = shutdown_signal() => {
            return Err("sync interrupted".into());
        }
    };

    print_report(&report, output)?;
    Ok(())
}

fn print_report(
    report: &ActivityReport,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            let mut rows: Vec<RepoRow> = report.synced.iter().map(RepoRow::from).collect();
            rows.extend(report.failures.iter().map(RepoRow::from));
            print_table(rows);

            let stats = stat_rows(report);
            if stats.is_empty() {
                println!("No events in the statistics window.");
            } else {
                print_table(stats);
            }
        }
    }
    Ok(())
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let mut table = tabled::Table::new(rows);
    table.with(tabled::settings::Style::rounded());
    println!("{}", table);
}

/// One repository's sync outcome.
#[derive(Debug, Clone, Tabled)]
struct RepoRow {
    #[tabled(rename = "Repository")]
    repository: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Fetched")]
    fetched: String,
    #[tabled(rename = "Inserted")]
    inserted: String,
    #[tabled(rename = "Skipped")]
    skipped: String,
    #[tabled(rename = "Error")]
    error: String,
}

impl From<&RepoSyncResult> for RepoRow {
    fn from(result: &RepoSyncResult) -> Self {
        Self {
            repository: result.full_name(),
            mode: result.mode.to_string(),
            fetched: result.fetched.to_string(),
            inserted: result.inserted.to_string(),
            skipped: result.skipped_malformed.to_string(),
            error: String::new(),
        }
    }
}

impl From<&RepoSyncFailure> for RepoRow {
    fn from(failure: &RepoSyncFailure) -> Self {
        Self {
            repository: format!("{}/{}", failure.owner, failure.repo),
            mode: "-".to_string(),
            fetched: "-".to_string(),
            inserted: "-".to_string(),
            skipped: "-".to_string(),
            error: failure.error.clone(),
        }
    }
}

/// One mean-gap entry.
#[derive(Debug, Clone, Tabled)]
struct StatRow {
    #[tabled(rename = "Grouping")]
    grouping: &'static str,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Mean gap (s)")]
    mean: String,
}

fn stat_rows(report: &ActivityReport) -> Vec<StatRow> {
    let stats = &report.stats;
    let row = |grouping: &'static str, key: String, mean: f64| StatRow {
        grouping,
        key,
        mean: format!("{:.1}", mean),
    };

    let mut rows: Vec<StatRow> = stats
        .mean_repo
        .iter()
        .map(|(repo, mean)| row("repo", repo.clone(), *mean))
        .collect();
    rows.extend(
        stats
            .mean_type
            .iter()
            .map(|(ty, mean)| row("type", ty.clone(), *mean)),
    );
    for (repo, by_type) in &stats.mean_repo_type {
        rows.extend(
            by_type
                .iter()
                .map(|(ty, mean)| row("repo/type", format!("{repo}/{ty}"), *mean)),
        );
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence::sync::SyncMode;

    fn report() -> ActivityReport {
        let mut report = ActivityReport::default();
        report.stats.mean_repo.insert("mongo".to_string(), 30.0);
        report.stats.mean_type.insert("PushEvent".to_string(), 30.0);
        report
            .stats
            .mean_repo_type
            .entry("mongo".to_string())
            .or_default()
            .insert("PushEvent".to_string(), 30.0);
        report.synced.push(RepoSyncResult {
            owner: "mongodb".to_string(),
            repo: "mongo".to_string(),
            stored_as: "mongo".to_string(),
            mode: SyncMode::Backfill,
            fetched: 3,
            inserted: 3,
            skipped_malformed: 0,
        });
        report.failures.push(RepoSyncFailure {
            owner: "rust-lang".to_string(),
            repo: "rust".to_string(),
            error: "HTTP 404".to_string(),
        });
        report
    }

    #[test]
    fn stat_rows_cover_every_grouping() {
        let rows = stat_rows(&report());
        let keys: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.grouping, r.key.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("repo", "mongo"),
                ("type", "PushEvent"),
                ("repo/type", "mongo/PushEvent"),
            ]
        );
        assert_eq!(rows[0].mean, "30.0");
    }

    #[test]
    fn repo_rows_show_failures() {
        let report = report();
        let ok = RepoRow::from(&report.synced[0]);
        assert_eq!(ok.repository, "mongodb/mongo");
        assert_eq!(ok.mode, "backfill");
        assert!(ok.error.is_empty());

        let failed = RepoRow::from(&report.failures[0]);
        assert_eq!(failed.repository, "rust-lang/rust");
        assert_eq!(failed.error, "HTTP 404");
    }

    #[test]
    fn table_output_renders() {
        print_report(&report(), OutputFormat::Table).unwrap();
        print_report(&ActivityReport::default(), OutputFormat::Json).unwrap();
    }
}
