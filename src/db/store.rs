//! SQLite store for monitoring samples and remediation events.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

/// Store error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// The two tables the store manages. Used by the timestamp migration to
/// address rows without string-built SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Samples,
    Events,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Samples => "monitoring_stats",
            Table::Events => "reboot_events",
        }
    }
}

/// Thread-safe store over a single SQLite database file.
///
/// Appends are single-statement inserts, so a failed write never leaves a
/// partial row visible to concurrent readers.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at the given path and apply migrations.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the schema from the embedded migrations.
    fn init(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| StoreError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    // --- Writes (daemon contract) ---

    /// Append one polling observation.
    pub fn record_sample(&self, sample: &NewSample) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO monitoring_stats (timestamp, tracked_aircraft, uploaded_aircraft, endpoint, feed_status, feed_server)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                encode_time(sample.timestamp),
                sample.tracked_aircraft,
                sample.uploaded_aircraft,
                sample.endpoint,
                sample.feed_status,
                sample.feed_server,
            ],
        )?;
        Ok(())
    }

    /// Append one remediation event and return its assigned id.
    pub fn record_event(&self, event: &NewEvent) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO reboot_events (timestamp, tracked_aircraft, threshold, reason, dry_run, uptime_hours, endpoint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                encode_time(event.timestamp),
                event.tracked_aircraft,
                event.threshold,
                event.reason,
                event.dry_run,
                event.uptime_hours,
                event.endpoint,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // --- Deletes ---

    /// Delete one remediation event by id.
    ///
    /// Returns whether a row was affected; a missing id is `Ok(false)`, so
    /// retries are safe.
    pub fn delete_event(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM reboot_events WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Delete samples and events older than the retention cutoff.
    pub fn prune(&self, older_than: DateTime<Utc>) -> Result<PruneOutcome, StoreError> {
        let cutoff = encode_time(older_than);
        let conn = self.conn.lock().unwrap();
        let samples_deleted = conn.execute(
            "DELETE FROM monitoring_stats WHERE timestamp < ?1",
            params![cutoff],
        )?;
        let events_deleted = conn.execute(
            "DELETE FROM reboot_events WHERE timestamp < ?1",
            params![cutoff],
        )?;
        Ok(PruneOutcome {
            samples_deleted,
            events_deleted,
        })
    }

    // --- Reads ---

    /// Most recent polling observation, or `None` for an empty store.
    pub fn latest_sample(&self) -> Result<Option<MonitoringSample>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let sample = conn
            .query_row(
                "SELECT timestamp, tracked_aircraft, uploaded_aircraft, endpoint, feed_status, feed_server
                 FROM monitoring_stats ORDER BY timestamp DESC LIMIT 1",
                [],
                sample_from_row,
            )
            .optional()?;
        Ok(sample)
    }

    /// Most recent remediation event, or `None` for an empty store.
    pub fn latest_event(&self) -> Result<Option<RemediationEvent>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let event = conn
            .query_row(
                "SELECT id, timestamp, tracked_aircraft, threshold, reason, dry_run, uptime_hours, endpoint
                 FROM reboot_events ORDER BY timestamp DESC, id DESC LIMIT 1",
                [],
                event_from_row,
            )
            .optional()?;
        Ok(event)
    }

    /// Remediation events, most recent first, bounded by `limit`.
    pub fn recent_events(&self, limit: i64) -> Result<Vec<RemediationEvent>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, tracked_aircraft, threshold, reason, dry_run, uptime_hours, endpoint
             FROM reboot_events ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let events = stmt
            .query_map(params![limit], event_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(events)
    }

    /// Samples at or after the cutoff, most recent first, bounded by `limit`.
    pub fn samples_since(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<MonitoringSample>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT timestamp, tracked_aircraft, uploaded_aircraft, endpoint, feed_status, feed_server
             FROM monitoring_stats WHERE timestamp >= ?1 ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let samples = stmt
            .query_map(params![encode_time(cutoff), limit], sample_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(samples)
    }

    /// Total remediation event count.
    pub fn count_events(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM reboot_events", [], |r| r.get(0))?)
    }

    /// Remediation events at or after the cutoff.
    pub fn count_events_since(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM reboot_events WHERE timestamp >= ?1",
            params![encode_time(cutoff)],
            |r| r.get(0),
        )?)
    }

    /// Remediation events in the half-open interval `[start, end)`.
    pub fn count_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM reboot_events WHERE timestamp >= ?1 AND timestamp < ?2",
            params![encode_time(start), encode_time(end)],
            |r| r.get(0),
        )?)
    }

    /// Total sample count, for retention logging.
    pub fn count_samples(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM monitoring_stats", [], |r| r.get(0))?)
    }

    // --- Timestamp migration support ---

    /// Rows whose stored timestamp is still the legacy naive encoding.
    ///
    /// The canonical encoding always contains a 'T' date/time separator; the
    /// legacy naive form never does, so the two are syntactically disjoint.
    pub fn legacy_timestamps(&self, table: Table) -> Result<Vec<(i64, String)>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT rowid, timestamp FROM {} WHERE instr(timestamp, 'T') = 0",
            table.name()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// Rewrite stored timestamps by rowid, all in one transaction.
    pub fn rewrite_timestamps(
        &self,
        table: Table,
        rewrites: &[(i64, String)],
    ) -> Result<(), StoreError> {
        if rewrites.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        {
            let sql = format!("UPDATE {} SET timestamp = ?1 WHERE rowid = ?2", table.name());
            let mut stmt = tx.prepare(&sql)?;
            for (rowid, canonical) in rewrites {
                stmt.execute(params![canonical, rowid])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Encode an instant in the canonical storage form, e.g. "2024-06-01T09:00:00Z".
///
/// Fixed-width UTC text, so lexicographic comparison in SQL matches
/// chronological order.
pub fn encode_time(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a canonical stored timestamp. `None` for anything unparsable; the
/// caller renders those as "N/A".
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn sample_from_row(row: &rusqlite::Row<'_>) -> SqlResult<MonitoringSample> {
    let time_str: String = row.get(0)?;
    Ok(MonitoringSample {
        timestamp: parse_db_time(&time_str),
        tracked_aircraft: row.get(1)?,
        uploaded_aircraft: row.get(2)?,
        endpoint: row.get(3)?,
        feed_status: row.get(4)?,
        feed_server: row.get(5)?,
    })
}

fn event_from_row(row: &rusqlite::Row<'_>) -> SqlResult<RemediationEvent> {
    let time_str: String = row.get(1)?;
    Ok(RemediationEvent {
        id: row.get(0)?,
        timestamp: parse_db_time(&time_str),
        tracked_aircraft: row.get(2)?,
        threshold: row.get(3)?,
        reason: row.get(4)?,
        dry_run: row.get(5)?,
        uptime_hours: row.get(6)?,
        endpoint: row.get(7)?,
    })
}
