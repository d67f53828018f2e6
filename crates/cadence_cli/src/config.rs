//! Configuration file support for cadence.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `CADENCE_`, e.g., `CADENCE_DATABASE_URL`)
//! 3. Config file (~/.config/cadence/config.toml or ./cadence.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/cadence/cadence.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/cadence/cadence.db"  # optional, this is the default
//!
//! [github]
//! token = "ghp_..."  # or use CADENCE_GITHUB_TOKEN env var
//! base_url = "https://api.github.com/repos"
//! requests_per_second = 10
//!
//! [sync]
//! page_concurrency = 2
//! max_incremental_pages = 10
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8000
//! request_timeout_secs = 300
//!
//! [stats]
//! window_days = 7
//! max_events = 500
//! ```

use std::path::PathBuf;
use std::time::Duration;

use cadence::StatsWindow;
use cadence::source::DEFAULT_BASE_URL;
use cadence::stats::{DEFAULT_MAX_EVENTS, DEFAULT_WINDOW_DAYS};
use cadence::sync::{DEFAULT_MAX_INCREMENTAL_PAGES, DEFAULT_PAGE_FETCH_CONCURRENCY, SyncOptions};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// GitHub API configuration.
    pub github: GitHubConfig,
    /// Sync tuning.
    pub sync: SyncConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Rolling statistics window.
    pub stats: StatsConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/cadence/cadence.db` if not specified.
    pub url: Option<String>,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. Unauthenticated requests get a much smaller quota.
    /// Can also be set via CADENCE_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    /// Base URL that `/{owner}/{repo}/events` is appended to.
    pub base_url: String,
    /// Client-side request pacing; 0 disables it.
    pub requests_per_second: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_per_second: 10,
        }
    }
}

/// Sync configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum backfill pages in flight per repository.
    pub page_concurrency: usize,
    /// Page budget for an incremental sync.
    pub max_incremental_pages: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_concurrency: DEFAULT_PAGE_FETCH_CONCURRENCY,
            max_incremental_pages: DEFAULT_MAX_INCREMENTAL_PAGES,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a single activity request, sync included.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: 300,
        }
    }
}

/// Statistics window configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub window_days: i64,
    pub max_events: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/cadence/config.toml)
    /// 3. Local config file (./cadence.toml)
    /// 4. Environment variables with CADENCE_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("cadence.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./cadence.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // CADENCE_DATABASE_URL -> database.url. Keys containing an
        // underscore can only be set from a file.
        builder = builder.add_source(
            Environment::with_prefix("CADENCE")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter lets SQLite create the file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("cadence.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            page_concurrency: self.sync.page_concurrency.max(1),
            max_incremental_pages: self.sync.max_incremental_pages.max(1),
        }
    }

    pub fn stats_window(&self) -> StatsWindow {
        StatsWindow::days(self.stats.window_days, self.stats.max_events)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cadence").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/cadence` or `~/.local/state/cadence`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cadence").map(|dirs| {
            // state_dir() returns None on macOS/Windows
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
