//! Remote event source.
//!
//! [`EventSource`] is the seam between the sync engine and the events API.
//! [`GitHubEventsClient`] is the production implementation; tests substitute
//! in-memory sources.

mod client;
pub mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod link;
pub mod rate_limit;
pub mod types;

use async_trait::async_trait;

pub use client::{ClientConfig, DEFAULT_BASE_URL, GITHUB_API_VERSION, GitHubEventsClient};
pub use error::{Result, SourceError, short_error_message};
pub use link::{LinkPagination, parse_link_header};
pub use rate_limit::{ApiRateLimiter, RateLimitGate, RateLimitWindow};
pub use types::{EventPage, RawEvent, RawRepoRef};

/// A paginated, newest-first feed of repository events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch one page (1-indexed) of `owner/repo` events.
    async fn fetch_page(&self, owner: &str, repo: &str, page: u32) -> Result<EventPage>;
}
