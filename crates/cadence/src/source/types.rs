//! Wire types returned by the events endpoint.

use serde::{Deserialize, Serialize};

use super::link::LinkPagination;
use super::rate_limit::RateLimitWindow;

/// Nested repository reference carried by each event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRepoRef {
    #[serde(default)]
    pub id: Option<i64>,
    /// `owner/name`.
    #[serde(default)]
    pub name: Option<String>,
    /// API URL of the repository, e.g. `https://api.github.com/repos/owner/name`.
    #[serde(default)]
    pub url: Option<String>,
}

/// One event record as returned by the API.
///
/// Every field is optional so that a single malformed record cannot fail the
/// decoding of a whole page; validation happens during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// GitHub encodes event ids as strings; numbers are accepted too.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub repo: Option<RawRepoRef>,
}

impl RawEvent {
    /// The event id as an integer, if present and well formed.
    pub fn event_id(&self) -> Option<i64> {
        match self.id.as_ref()? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A single fetched page of events plus the response metadata.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    /// Page number (1-indexed).
    pub page: u32,
    /// Events in API order (newest first).
    pub events: Vec<RawEvent>,
    /// Pagination parsed from the `Link` header.
    pub pagination: LinkPagination,
    /// Rate-limit window reported with this page.
    pub rate_limit: Option<RateLimitWindow>,
}

impl EventPage {
    /// Highest page reachable according to this page's metadata.
    ///
    /// Without a `rel="last"` link there are no pages beyond this one.
    pub fn last_page(&self) -> u32 {
        self.pagination
            .total_pages()
            .map_or(self.page, |last| last.max(self.page))
    }
}
