//! Append-only transcript store for utterances and client events

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;

use super::DbPool;
use crate::{Error, Result};

/// One recorded unit of speech or synthesized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: i64,
    pub text: String,
    /// Recording path or published audio URL; empty when none exists
    pub audio_reference: String,
    /// Machine-voiced ("other" speaker) rather than the live user
    pub is_synthesized: bool,
    pub created_at: DateTime<Utc>,
    pub interval: Interval,
}

/// Wall-clock span covered by an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Build an interval, clamping `end` so that `start <= end` always holds
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Zero-length interval at a single instant
    #[must_use]
    pub const fn instant(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    /// Whether two intervals share any time beyond a touching endpoint
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// An out-of-band client signal
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: i64,
    pub event_type: String,
    pub event_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Transcript repository
///
/// Owns utterance and event identity. Rows are never updated or deleted.
#[derive(Clone)]
pub struct TranscriptStore {
    pool: DbPool,
}

impl TranscriptStore {
    /// Create a new transcript store
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append an utterance stamped with the current time
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn append_utterance(
        &self,
        text: &str,
        audio_reference: &str,
        is_synthesized: bool,
        interval: Interval,
    ) -> Result<i64> {
        self.append_utterance_at(text, audio_reference, is_synthesized, interval, Utc::now())
    }

    /// Append an utterance with an explicit creation time
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn append_utterance_at(
        &self,
        text: &str,
        audio_reference: &str,
        is_synthesized: bool,
        interval: Interval,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO utterances
                (text, audio_reference, is_synthesized, created_at, interval_start, interval_end)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                text,
                audio_reference,
                is_synthesized,
                format_datetime(created_at),
                format_datetime(interval.start),
                format_datetime(interval.end),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();
        tracing::debug!(id, is_synthesized, "utterance appended");
        Ok(id)
    }

    /// Append a client event
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be serialized or the insert fails
    pub fn append_event(&self, event_type: &str, payload: &serde_json::Value) -> Result<i64> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let payload = serde_json::to_string(payload)?;
        conn.execute(
            "INSERT INTO events (event_type, event_payload, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![event_type, payload, format_datetime(Utc::now())],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();
        tracing::debug!(id, event_type, "event appended");
        Ok(id)
    }

    /// Utterances created at or after `since`, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn recent_utterances(&self, since: DateTime<Utc>) -> Result<Vec<Utterance>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, text, audio_reference, is_synthesized, created_at, interval_start, interval_end
                 FROM utterances WHERE created_at >= ?1
                 ORDER BY created_at ASC, id ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let utterances = stmt
            .query_map([format_datetime(since)], |row| {
                Ok(Utterance {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    audio_reference: row.get(2)?,
                    is_synthesized: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    interval: Interval {
                        start: parse_datetime(&row.get::<_, String>(5)?),
                        end: parse_datetime(&row.get::<_, String>(6)?),
                    },
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(utterances)
    }

    /// Look up a single utterance
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn utterance(&self, id: i64) -> Result<Option<Utterance>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.query_row(
            "SELECT id, text, audio_reference, is_synthesized, created_at, interval_start, interval_end
             FROM utterances WHERE id = ?1",
            [id],
            |row| {
                Ok(Utterance {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    audio_reference: row.get(2)?,
                    is_synthesized: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    interval: Interval {
                        start: parse_datetime(&row.get::<_, String>(5)?),
                        end: parse_datetime(&row.get::<_, String>(6)?),
                    },
                })
            },
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Most recent events, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, event_type, event_payload, created_at
                 FROM events ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        #[allow(clippy::cast_possible_wrap)]
        let events = stmt
            .query_map([limit as i64], |row| {
                Ok(Event {
                    id: row.get(0)?,
                    event_type: row.get(1)?,
                    event_payload: serde_json::from_str(&row.get::<_, String>(2)?)
                        .unwrap_or(serde_json::Value::Null),
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(events)
    }

    /// Count stored utterances
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn utterance_count(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM utterances")
    }

    /// Count stored events
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn event_count(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM events")
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// Fixed-width UTC timestamps so that text order equals time order
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
