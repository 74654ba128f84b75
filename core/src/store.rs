//! SQLite persistence for finished runs.
//!
//! RULE: the clock and the logger never touch the database. Callers hand
//! their trace and logger table to the store after (or between) runs.

use crate::{
    error::{SimError, SimResult},
    event::{TraceEntry, TraceKind},
    logger::Record,
};
use rusqlite::{params, Connection};

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance. Not available in memory.
        if path != ":memory:" {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, model: &str, seed: u64, started_at: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, model, seed, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, model, seed as i64, started_at],
        )?;
        Ok(())
    }

    // ── Trace ──────────────────────────────────────────────────

    pub fn append_trace(&mut self, run_id: &str, entries: &[TraceEntry]) -> SimResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO trace (run_id, seq, time, kind, label) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    run_id,
                    entry.seq as i64,
                    entry.time,
                    kind_name(entry.kind),
                    entry.label,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn trace_for_run(&self, run_id: &str) -> SimResult<Vec<TraceEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, time, kind, label FROM trace WHERE run_id = ?1 ORDER BY seq ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(seq, time, kind, label)| -> SimResult<TraceEntry> {
                Ok(TraceEntry { seq: seq as u64, time, kind: parse_kind(&kind)?, label })
            })
            .collect()
    }

    // ── Logger table ───────────────────────────────────────────

    pub fn save_records(&mut self, run_id: &str, records: &[Record]) -> SimResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO log_record (run_id, time, payload) VALUES (?1, ?2, ?3)")?;
            for record in records {
                let payload = serde_json::to_string(&record.values)?;
                stmt.execute(params![run_id, record.time, payload])?;
            }
        }
        tx.commit()?;
        log::debug!("Saved {} log records for run {run_id}", records.len());
        Ok(())
    }

    pub fn records_for_run(&self, run_id: &str) -> SimResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT time, payload FROM log_record WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, f64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(time, payload)| -> SimResult<Record> {
                Ok(Record { time, values: serde_json::from_str(&payload)? })
            })
            .collect()
    }
}

fn kind_name(kind: TraceKind) -> &'static str {
    match kind {
        TraceKind::Tick  => "tick",
        TraceKind::Event => "event",
    }
}

fn parse_kind(name: &str) -> SimResult<TraceKind> {
    match name {
        "tick"  => Ok(TraceKind::Tick),
        "event" => Ok(TraceKind::Event),
        other   => Err(SimError::UnknownTraceKind(other.to_string())),
    }
}
