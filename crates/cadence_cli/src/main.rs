//! Cadence CLI - sync GitHub repository events and serve activity statistics.

mod commands;
mod config;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::sync::OutputFormat;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(version)]
#[command(about = "Rolling time-between-events statistics for GitHub repositories")]
#[command(
    long_about = "Cadence keeps a local copy of the public event feed of GitHub repositories, \
syncing incrementally on every request, and reports the mean time between events per \
repository, per event type, and per repository and event type over a trailing window."
)]
#[command(after_long_help = r#"EXAMPLES
    Serve the activity endpoint on the default address:
        $ cadence serve

    Query it:
        $ curl -X POST localhost:8000/get_repo_activity/ \
            -H 'content-type: application/json' \
            -d '{"owners": ["mongodb"], "repos": ["mongo"]}'

    Sync and print statistics without a server:
        $ cadence sync mongodb/mongo rust-lang/rust

    Preview statistics without touching the database:
        $ cadence sync mongodb/mongo --dry-run --output json

    Generate shell completions:
        $ cadence completions bash > ~/.local/share/bash-completion/completions/cadence

CONFIGURATION
    Cadence reads configuration from:
      1. ~/.config/cadence/config.toml (or $XDG_CONFIG_HOME/cadence/config.toml)
      2. ./cadence.toml
      3. Environment variables (CADENCE_* prefix, e.g., CADENCE_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    CADENCE_DATABASE_URL      Database connection string (default: ~/.local/state/cadence/cadence.db)
    CADENCE_GITHUB_TOKEN      GitHub personal access token
    CADENCE_SERVER_HOST       Address to bind (default: 127.0.0.1)
    CADENCE_SERVER_PORT       Port to bind (default: 8000)
    RUST_LOG                  Log filter (default: cadence=info,cadence_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the repository activity endpoint
    Serve {
        /// Address to bind (default from config or 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (default from config or 8000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Sync repositories once and print their statistics
    Sync {
        /// Repositories as OWNER/REPO (at most 5)
        #[arg(required = true, value_name = "OWNER/REPO")]
        full_names: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,

        /// Fetch and compute statistics without writing to the database
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cadence=info,cadence_cli=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        return commands::meta::handle_completions(shell);
    }

    let config = config::Config::load();
    let database_url = config
        .database_url()
        .ok_or("Could not determine a database URL; set CADENCE_DATABASE_URL")?;

    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Serve { host, port } => {
            commands::serve::handle_serve(host, port, &config, &database_url).await?;
        }
        Commands::Sync {
            full_names,
            output,
            dry_run,
        } => {
            commands::sync::handle_sync(full_names, output, dry_run, &config, &database_url)
                .await?;
        }
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
