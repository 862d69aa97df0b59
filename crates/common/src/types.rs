//! Canonical message and timestamp types shared by the ingest and dispatch
//! sides of the pipeline.

use std::{borrow::Cow, fmt};

use {
    chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

/// An ISO-8601 UTC instant stored as text.
///
/// Values built by this type always use the same width
/// (`YYYY-MM-DDTHH:MM:SS.ffffffZ`), so lexical order is chronological order.
/// The empty string is the "nothing processed yet" sentinel and sorts before
/// every real instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// The sentinel meaning "no watermark".
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    /// Build from Unix milliseconds. `None` when out of chrono's range.
    #[must_use]
    pub fn from_unix_millis(ms: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(ms).single().map(Self::from_datetime)
    }

    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Parse and normalize an externally supplied timestamp.
    ///
    /// Accepts RFC 3339 with any offset, or a naive `YYYY-MM-DDTHH:MM:SS[.f]`
    /// which is taken as UTC. An empty input yields the empty sentinel.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::empty());
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Self::from_datetime(naive.and_utc()))
            .map_err(|source| Error::Timestamp {
                value: raw.to_string(),
                source,
            })
    }

    /// Wrap a value read back from storage without re-normalizing it.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.0)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("(none)")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// A normalized inbound chat message as persisted by the message store.
///
/// Identity is `(id, conversation_id)`; storing the same identity again
/// replaces the previous row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub timestamp: Timestamp,
    pub is_self: bool,
}

impl ChannelMessage {
    pub fn identity(&self) -> (&str, &str) {
        (&self.id, &self.conversation_id)
    }
}

/// Shorten `text` to at most `max_chars` characters for log output.
pub fn preview(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &text[..idx])),
        None => Cow::Borrowed(text),
    }
}
