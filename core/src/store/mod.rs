//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The pipeline calls store methods; it never executes SQL directly.

use crate::{error::AuditResult, event::{AuditEvent, EventLogEntry}};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, types::Type, Connection};

mod assessment;
mod report;
mod session;

pub struct AuditStore {
    conn: Connection,
}

impl AuditStore {
    pub fn open(path: &str) -> AuditResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AuditResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> AuditResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, session_id: Option<&str>, event: &AuditEvent) -> AuditResult<()> {
        write_event(&self.conn, session_id, event)
    }

    pub fn events_for_session(&self, session_id: &str) -> AuditResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, event_type, payload, created_at
             FROM event_log WHERE session_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![session_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    session_id: row.get(1)?,
                    event_type: row.get(2)?,
                    payload:    row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, event_type: &str) -> AuditResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
            params![event_type],
            |r| r.get(0),
        )?)
    }
}

fn write_event(conn: &Connection, session_id: Option<&str>, event: &AuditEvent) -> AuditResult<()> {
    conn.execute(
        "INSERT INTO event_log (session_id, event_type, payload, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            session_id,
            event.type_name(),
            serde_json::to_string(event)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

// ── Column conversion helpers ──────────────────────────────────

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s).map_err(|e| conversion_error(idx, e))
}
