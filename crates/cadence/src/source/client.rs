//! GitHub events API client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::EventSource;
use super::error::{Result, SourceError};
use super::link::parse_link_header;
use super::rate_limit::{RateLimitGate, RateLimitWindow};
use super::types::{EventPage, RawEvent};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpError, HttpHeaders, HttpRequest, HttpTransport};
use crate::retry::{RetryConfig, with_retry};
use crate::sync::PAGE_SIZE;

/// Base URL of the repositories API.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com/repos";

/// REST API version pinned in every request.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// Default per-request timeout for the reqwest transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable per-client request configuration.
///
/// Headers are assembled once at construction and shared by every request;
/// nothing mutates them afterwards, so one client can serve concurrent
/// orchestrations.
#[derive(Clone)]
pub struct ClientConfig {
    base_url: String,
    headers: HttpHeaders,
}

impl ClientConfig {
    /// Build a configuration for `base_url`, authenticating with `token` when given.
    pub fn new(base_url: impl Into<String>, token: Option<&str>) -> Self {
        let mut headers: HttpHeaders = vec![
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
            (
                "X-GitHub-Api-Version".to_string(),
                GITHUB_API_VERSION.to_string(),
            ),
            ("User-Agent".to_string(), "cadence".to_string()),
        ];

        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    /// Whether requests carry an `Authorization` header.
    pub fn is_authenticated(&self) -> bool {
        crate::http::header_get(&self.headers, "authorization").is_some()
    }

    /// URL of one page of a repository's events.
    pub fn events_url(&self, owner: &str, repo: &str, page: u32) -> String {
        format!(
            "{}/{}/{}/events?per_page={}&page={}",
            self.base_url, owner, repo, PAGE_SIZE, page
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, None)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

/// Events API client implementing [`EventSource`].
///
/// Every request passes through the shared [`RateLimitGate`] before it is sent
/// and reports the response's rate-limit headers back to it.
#[derive(Clone)]
pub struct GitHubEventsClient {
    transport: Arc<dyn HttpTransport>,
    config: Arc<ClientConfig>,
    gate: Arc<RateLimitGate>,
    retry: RetryConfig,
}

impl GitHubEventsClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: ClientConfig,
        gate: Arc<RateLimitGate>,
    ) -> Self {
        Self {
            transport,
            config: Arc::new(config),
            gate,
            retry: RetryConfig::default(),
        }
    }

    /// Create a client backed by reqwest with the default request timeout.
    pub fn with_reqwest(
        config: ClientConfig,
        gate: Arc<RateLimitGate>,
    ) -> std::result::Result<Self, HttpError> {
        let transport = ReqwestTransport::with_timeout(DEFAULT_REQUEST_TIMEOUT)?;
        Ok(Self::new(Arc::new(transport), config, gate))
    }

    /// Replace the retry policy for transient failures.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<RateLimitGate> {
        &self.gate
    }

    async fn fetch_page_once(&self, owner: &str, repo: &str, page: u32) -> Result<EventPage> {
        self.gate.acquire().await;

        let url = self.config.events_url(owner, repo, page);
        let response = self
            .transport
            .get(HttpRequest {
                url: url.clone(),
                headers: self.config.headers().clone(),
            })
            .await
            .map_err(|e| SourceError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let rate_limit = RateLimitWindow::from_headers(&response.headers)?;
        if let Some(window) = rate_limit {
            self.gate.observe(window).await;
        }

        if !response.is_success() {
            return Err(match rate_limit {
                Some(RateLimitWindow {
                    remaining: 0,
                    reset_at: Some(reset_at),
                    ..
                }) if matches!(response.status, 403 | 429) => SourceError::RateLimited { reset_at },
                _ => SourceError::Status {
                    status: response.status,
                    url,
                },
            });
        }

        let events: Vec<RawEvent> =
            serde_json::from_slice(&response.body).map_err(|e| SourceError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let pagination = response
            .header("link")
            .map(parse_link_header)
            .unwrap_or_default();

        tracing::debug!(
            owner,
            repo,
            page,
            count = events.len(),
            last_page = ?pagination.last_page,
            remaining = ?rate_limit.map(|w| w.remaining),
            "Fetched events page"
        );

        Ok(EventPage {
            page,
            events,
            pagination,
            rate_limit,
        })
    }
}

#[async_trait]
impl EventSource for GitHubEventsClient {
    async fn fetch_page(&self, owner: &str, repo: &str, page: u32) -> Result<EventPage> {
        let label = format!("{owner}/{repo} page {page}");
        with_retry(
            || self.fetch_page_once(owner, repo, page),
            SourceError::is_transient,
            &self.retry,
            &label,
        )
        .await
    }
}
