//! Quota tracking and backoff for the source API.
//!
//! Every response carries the caller's remaining request quota and the epoch
//! second at which it renews. [`RateLimitGate`] keeps the latest observed
//! window and makes callers wait for the reset once the quota is spent. A
//! single gate is shared by every request a client issues, including
//! concurrent page fetches, so the local count never lets a burst exceed what
//! the server reported.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::Mutex;

use super::error::{Result, SourceError};
use crate::http::{HttpHeaders, header_get};

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Remaining quota and reset time reported by a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    /// Maximum requests per period, when reported.
    pub limit: Option<u64>,
    /// Requests left in the current period.
    pub remaining: u64,
    /// When the quota renews. Always present once the quota is spent.
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitWindow {
    /// Read the rate-limit headers of a response.
    ///
    /// Returns `Ok(None)` when the response carries no remaining-quota header.
    /// A remaining count that is present but unparsable is an error, as is an
    /// exhausted quota without a usable reset time: the caller must not
    /// proceed as if quota were available.
    pub fn from_headers(headers: &HttpHeaders) -> Result<Option<Self>> {
        let Some(raw_remaining) = header_get(headers, HEADER_REMAINING) else {
            return Ok(None);
        };

        let remaining = raw_remaining
            .trim()
            .parse::<u64>()
            .map_err(|_| malformed(HEADER_REMAINING, raw_remaining))?;

        let raw_reset = header_get(headers, HEADER_RESET);
        let reset_at = raw_reset
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0));
        if remaining == 0 && reset_at.is_none() {
            return Err(malformed(HEADER_RESET, raw_reset.unwrap_or_default()));
        }

        let limit = header_get(headers, HEADER_LIMIT).and_then(|v| v.trim().parse::<u64>().ok());

        Ok(Some(Self {
            limit,
            remaining,
            reset_at,
        }))
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

fn malformed(header: &'static str, value: &str) -> SourceError {
    SourceError::MalformedRateLimit {
        header,
        value: value.to_string(),
    }
}

/// Time left until `reset_at`, clamped to zero when the reset already passed.
pub fn wait_duration(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (reset_at - now).to_std().unwrap_or(Duration::ZERO)
}

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Proactive request pacing using the governor crate.
///
/// This spreads requests out over time independently of the quota reported
/// by the server.
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a limiter allowing `requests_per_second` (treated as 1 when zero).
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        }
    }

    /// Wait until the limiter admits another request.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

/// Shared quota gate applied before every source request.
#[derive(Default)]
pub struct RateLimitGate {
    window: Mutex<Option<RateLimitWindow>>,
    pacer: Option<ApiRateLimiter>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gate that additionally paces requests to `requests_per_second`.
    ///
    /// Zero disables pacing.
    pub fn with_requests_per_second(requests_per_second: u32) -> Self {
        Self {
            window: Mutex::new(None),
            pacer: (requests_per_second > 0).then(|| ApiRateLimiter::new(requests_per_second)),
        }
    }

    /// Wait until a request may be issued, then reserve one unit of quota.
    ///
    /// When the last observed window is exhausted this sleeps until its reset
    /// time. The lock is released while sleeping so responses already in
    /// flight can still be observed; the window is re-checked on waking.
    pub async fn acquire(&self) {
        if let Some(pacer) = &self.pacer {
            pacer.wait().await;
        }

        loop {
            let reset_at = {
                let mut guard = self.window.lock().await;
                let Some(window) = guard.as_mut() else {
                    return;
                };
                if !window.is_exhausted() {
                    window.remaining -= 1;
                    return;
                }
                window.reset_at
            };

            let now = Utc::now();
            let wait = wait_duration(reset_at.unwrap_or(now), now);
            tracing::warn!(
                reset_at = ?reset_at,
                wait_secs = wait.as_secs(),
                "Rate limit exhausted, waiting for quota to renew"
            );
            tokio::time::sleep(wait).await;

            // The spent window is over; forget it unless a newer one replaced it.
            let mut guard = self.window.lock().await;
            if guard.is_some_and(|w| w.is_exhausted() && w.reset_at == reset_at) {
                *guard = None;
            }
        }
    }

    /// Record the window reported by a response.
    ///
    /// Within one reset period the smaller remaining count wins, so responses
    /// that arrive out of order cannot hand back quota already reserved.
    pub async fn observe(&self, observed: RateLimitWindow) {
        let mut guard = self.window.lock().await;
        let next = match *guard {
            Some(current) if current.reset_at == observed.reset_at => RateLimitWindow {
                remaining: current.remaining.min(observed.remaining),
                ..observed
            },
            _ => observed,
        };
        tracing::trace!(
            remaining = next.remaining,
            reset_at = ?next.reset_at,
            "Observed rate limit window"
        );
        *guard = Some(next);
    }

    /// The currently tracked window, if any response reported one.
    pub async fn snapshot(&self) -> Option<RateLimitWindow> {
        *self.window.lock().await
    }
}
