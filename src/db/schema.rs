//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Spoken and synthesized utterances (append-only)
        CREATE TABLE IF NOT EXISTS utterances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL,
            audio_reference TEXT NOT NULL DEFAULT '',
            is_synthesized INTEGER NOT NULL CHECK(is_synthesized IN (0, 1)),
            created_at TEXT NOT NULL,
            interval_start TEXT NOT NULL,
            interval_end TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_utterances_created ON utterances(created_at);

        -- Out-of-band client events (append-only)
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type TEXT NOT NULL,
            event_payload TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);

        PRAGMA user_version = 1;
        ",
    )?;

    Ok(())
}
