//! Mapping raw API records to canonical [`Event`]s.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::event::Event;
use crate::source::RawEvent;

/// Event type recorded when the API omits one.
pub const UNKNOWN_EVENT_TYPE: &str = "Unknown";

/// Why a raw record could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("event is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("event id {0} is not an integer")]
    InvalidId(String),

    #[error("invalid event timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Normalize one raw record.
pub fn normalize(raw: &RawEvent) -> Result<Event, NormalizeError> {
    let raw_id = raw.id.as_ref().ok_or(NormalizeError::MissingField("id"))?;
    let id = raw
        .event_id()
        .ok_or_else(|| NormalizeError::InvalidId(raw_id.to_string()))?;

    let created_at = raw
        .created_at
        .as_deref()
        .ok_or(NormalizeError::MissingField("created_at"))
        .and_then(parse_timestamp)?;

    let repo_ref = raw.repo.as_ref().ok_or(NormalizeError::MissingField("repo"))?;
    let repo = repo_ref
        .url
        .as_deref()
        .and_then(repo_name_from_url)
        .or_else(|| repo_ref.name.as_deref().and_then(repo_name_from_url))
        .ok_or(NormalizeError::MissingField("repo.url"))?;

    let event_type = raw
        .event_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNKNOWN_EVENT_TYPE);

    Ok(Event::new(id, event_type, created_at, repo))
}

/// Parse an API timestamp into UTC.
///
/// A trailing `Z` is stripped and the rest read as a naive UTC time; explicit
/// offsets are converted to UTC; a bare naive timestamp is taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, NormalizeError> {
    let trimmed = value.trim();
    let invalid = || NormalizeError::InvalidTimestamp(value.to_string());

    if let Some(naive) = trimmed.strip_suffix(['Z', 'z']) {
        return parse_naive(naive).ok_or_else(invalid);
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    parse_naive(trimmed).ok_or_else(invalid)
}

fn parse_naive(value: &str) -> Option<DateTime<Utc>> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Final non-empty path segment of a repository URL or `owner/name` string.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    url.trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Outcome of normalizing a fetched batch.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Successfully normalized events, in input order.
    pub events: Vec<Event>,
    /// Number of records dropped as malformed.
    pub skipped: usize,
    /// The error for each dropped record.
    pub errors: Vec<NormalizeError>,
}

/// Normalize every record, skipping and counting the malformed ones.
pub fn normalize_batch(raws: &[RawEvent]) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        events: Vec::with_capacity(raws.len()),
        ..Default::default()
    };

    for raw in raws {
        match normalize(raw) {
            Ok(event) => batch.events.push(event),
            Err(err) => {
                tracing::warn!(id = ?raw.id, error = %err, "Skipping malformed event");
                batch.skipped += 1;
                batch.errors.push(err);
            }
        }
    }

    batch
}
