//! SQLite-based break history and key/value storage.
//!
//! Provides persistent storage for:
//! - Completed breaks (eye rests and posture checks)
//! - Break statistics (daily and all-time)
//! - Key-value store for timer snapshots, streaks and settings

use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::{BreakHistory, KeyValueStore};
use crate::error::StorageError;
use crate::timer::TimerKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakRecord {
    pub id: i64,
    pub kind: TimerKind,
    pub duration_secs: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Stats {
    pub total_breaks: u64,
    pub eye_breaks: u64,
    pub posture_checks: u64,
    /// Sum of the intervals that ran to completion.
    pub focus_secs: u64,
}

/// SQLite database for break history and application state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`.
    ///
    /// Creates the schema if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS breaks (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                kind          TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                completed_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_breaks_completed_at ON breaks(completed_at);
            CREATE INDEX IF NOT EXISTS idx_breaks_kind ON breaks(kind);",
        )?;
        Ok(())
    }

    /// Record a completed break.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_break(
        &self,
        kind: TimerKind,
        duration_secs: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO breaks (kind, duration_secs, completed_at) VALUES (?1, ?2, ?3)",
            params![kind.as_str(), duration_secs, timestamp(completed_at)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent breaks first.
    pub fn recent_breaks(&self, limit: usize) -> Result<Vec<BreakRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, duration_secs, completed_at
             FROM breaks
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, kind, duration_secs, completed_at) = row?;
            let Some(kind) = TimerKind::parse(&kind) else {
                continue;
            };
            let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| StorageError::Malformed {
                    key: format!("breaks.{id}"),
                    message: e.to_string(),
                })?;
            records.push(BreakRecord {
                id,
                kind,
                duration_secs,
                completed_at,
            });
        }
        Ok(records)
    }

    /// Stats for one UTC calendar day.
    pub fn stats_for_day(&self, day: NaiveDate) -> Result<Stats, StorageError> {
        let start = day_start(day);
        let end = day_start(day.checked_add_days(Days::new(1)).unwrap_or(day));
        self.aggregate(
            "SELECT kind, COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM breaks
             WHERE completed_at >= ?1 AND completed_at < ?2
             GROUP BY kind",
            params![start, end],
        )
    }

    pub fn stats_today(&self) -> Result<Stats, StorageError> {
        self.stats_for_day(Utc::now().date_naive())
    }

    pub fn stats_all(&self) -> Result<Stats, StorageError> {
        self.aggregate(
            "SELECT kind, COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM breaks
             GROUP BY kind",
            [],
        )
    }

    fn aggregate<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Stats, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut stats = Stats::default();
        for row in rows {
            let (kind, count, secs) = row?;
            stats.total_breaks += count;
            stats.focus_secs += secs;
            match TimerKind::parse(&kind) {
                Some(TimerKind::Eye) => stats.eye_breaks += count,
                Some(TimerKind::Posture) => stats.posture_checks += count,
                None => {}
            }
        }
        Ok(stats)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let Some(text) = self.kv_get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StorageError::Malformed {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError> {
        self.kv_set(key, &value.to_string())?;
        Ok(())
    }
}

impl BreakHistory for Database {
    fn record_break(
        &self,
        kind: TimerKind,
        duration_secs: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.insert_break(kind, duration_secs, completed_at)?;
        Ok(())
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn day_start(day: NaiveDate) -> String {
    format!("{}T00:00:00Z", day.format("%Y-%m-%d"))
}
