//! SQLite event ledger.
//!
//! RULE: Only ledger.rs talks to the database.
//! The engine and workers call `record`; they never execute SQL directly.
//! Recording is best-effort: a ledger failure is logged and never fails the
//! operation that produced the event.

use crate::{error::ShipyardResult, event::ShipyardEvent};
use rusqlite::{params, Connection};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id:          Option<i64>,
    pub event_type:  String,
    pub payload:     String,
    pub recorded_at: String,
}

impl LedgerEntry {
    pub fn event(&self) -> ShipyardResult<ShipyardEvent> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// `rusqlite::Connection` is `Send` but not `Sync`; workers share it
/// through a mutex.
pub struct EventLedger {
    conn: Mutex<Connection>,
}

impl EventLedger {
    /// Open (or create) the ledger database at `path`.
    pub fn open(path: &str) -> ShipyardResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; ignore failures elsewhere.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory ledger (used when no ledger path is configured).
    pub fn in_memory() -> ShipyardResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ShipyardResult<()> {
        self.conn()
            .execute_batch(include_str!("../../migrations/001_ledger.sql"))?;
        Ok(())
    }

    pub fn append(&self, event: &ShipyardEvent) -> ShipyardResult<()> {
        let payload = serde_json::to_string(event)?;
        let recorded_at = chrono::Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO event_ledger (event_type, payload, recorded_at) VALUES (?1, ?2, ?3)",
            params![event.event_type(), payload, recorded_at],
        )?;
        Ok(())
    }

    /// Best-effort append.
    pub fn record(&self, event: ShipyardEvent) {
        if let Err(e) = self.append(&event) {
            log::warn!("Ledger write failed for {}: {e}", event.event_type());
        }
    }

    pub fn entries(&self) -> ShipyardResult<Vec<LedgerEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, event_type, payload, recorded_at
             FROM event_ledger ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(LedgerEntry {
                    id:          Some(row.get(0)?),
                    event_type:  row.get(1)?,
                    payload:     row.get(2)?,
                    recorded_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn count_of(&self, event_type: &str) -> ShipyardResult<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM event_ledger WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Most recent event of the given type, if any.
    pub fn latest_of(&self, event_type: &str) -> ShipyardResult<Option<ShipyardEvent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT payload FROM event_ledger
             WHERE event_type = ?1 ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![event_type])?;
        let payload: Option<String> = match rows.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        };
        payload
            .map(|p| serde_json::from_str(&p).map_err(Into::into))
            .transpose()
    }
}
