//! Scripted in-memory event source for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::{Result, SourceError};
use super::link::LinkPagination;
use super::types::{EventPage, RawEvent, RawRepoRef};
use super::EventSource;

/// Serves fixed pages per `owner/repo` and records every page requested.
#[derive(Default)]
pub struct FakeEventSource {
    pages: HashMap<String, Vec<Vec<RawEvent>>>,
    failing: HashMap<String, (u32, u16)>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl FakeEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `pages` (newest first) for `owner/repo`.
    pub fn with_pages(mut self, owner: &str, repo: &str, pages: Vec<Vec<RawEvent>>) -> Self {
        self.pages.insert(format!("{owner}/{repo}"), pages);
        self
    }

    /// Answer `page` of `owner/repo` with HTTP `status`.
    pub fn failing_at(mut self, owner: &str, repo: &str, page: u32, status: u16) -> Self {
        self.failing.insert(format!("{owner}/{repo}"), (page, status));
        self
    }

    /// Every `(owner/repo, page)` requested so far, in call order.
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl EventSource for FakeEventSource {
    async fn fetch_page(&self, owner: &str, repo: &str, page: u32) -> Result<EventPage> {
        let key = format!("{owner}/{repo}");
        self.calls.lock().expect("calls lock").push((key.clone(), page));

        if let Some(&(failing_page, status)) = self.failing.get(&key)
            && failing_page == page
        {
            return Err(SourceError::Status {
                status,
                url: format!("fake://{key}/events?page={page}"),
            });
        }

        let pages = self.pages.get(&key).cloned().unwrap_or_default();
        let total = pages.len() as u32;
        let events = pages
            .get(page.saturating_sub(1) as usize)
            .cloned()
            .unwrap_or_default();

        Ok(EventPage {
            page,
            events,
            pagination: LinkPagination {
                last_page: (total > 1).then_some(total),
                next_page: (page < total).then_some(page + 1),
            },
            rate_limit: None,
        })
    }
}

/// A well-formed raw event for `owner/repo`.
pub fn raw_event(id: i64, event_type: &str, created_at: &str, owner: &str, repo: &str) -> RawEvent {
    RawEvent {
        id: Some(serde_json::Value::String(id.to_string())),
        event_type: Some(event_type.to_string()),
        created_at: Some(created_at.to_string()),
        repo: Some(RawRepoRef {
            id: None,
            name: Some(format!("{owner}/{repo}")),
            url: Some(format!("https://api.github.com/repos/{owner}/{repo}")),
        }),
    }
}
