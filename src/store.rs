//! SQLite-backed persistence for observation windows and their samples.
//!
//! One ingest request becomes one row in `windows` plus one row per
//! sample in `samples`, written inside a single transaction so a window
//! is never visible with missing samples. Sequence numbers are assigned
//! here from array position; the client has no say in ordering.

use crate::ingest::IngestRequest;
use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Rows per physical INSERT statement when bulk-writing samples.
/// Bounds statement size for large batches; not a correctness concern.
const INSERT_BATCH_SIZE: usize = 500;

/// Durable store for windows and samples.
pub struct Store {
    conn: Connection,
}

/// A persisted observation window.
#[derive(Debug, Clone)]
pub struct WindowRecord {
    pub id: i64,
    pub created_at: String,
    pub device_id: String,
    pub sos_id: Option<String>,
    pub window_sec: Option<i64>,
    pub hz: Option<i64>,
    pub t_start: String,
    pub t_end: String,
    pub sample_count: i64,
}

/// A persisted sample row, including its server-assigned sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub seq: i64,
    pub time: String,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub ppg_green: i64,
    pub ppg_ir: Option<i64>,
    pub ppg_red: Option<i64>,
}

impl Store {
    /// Open (or create) the store at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::init_connection(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory store. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self { conn })
    }

    fn init_connection(conn: &Connection) -> Result<()> {
        // Cascade from windows to samples requires foreign keys, which
        // SQLite leaves off per connection.
        conn.pragma_update(None, "foreign_keys", true)?;
        Self::init_schema(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS windows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                device_id TEXT NOT NULL,
                sos_id TEXT,
                window_sec INTEGER,
                hz INTEGER,
                t_start TEXT NOT NULL,
                t_end TEXT NOT NULL,
                sample_count INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_windows_device_created
                ON windows(device_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_windows_sos ON windows(sos_id);
            CREATE TABLE IF NOT EXISTS samples (
                window_id INTEGER NOT NULL REFERENCES windows(id) ON DELETE CASCADE,
                seq INTEGER NOT NULL,
                time TEXT NOT NULL,
                ax REAL NOT NULL,
                ay REAL NOT NULL,
                az REAL NOT NULL,
                ppg_green INTEGER NOT NULL,
                ppg_ir INTEGER,
                ppg_red INTEGER,
                PRIMARY KEY (window_id, seq)
            );
            ",
        )?;
        Ok(())
    }

    /// Persist one validated batch as a window plus its samples.
    ///
    /// The window row and every sample row are written inside a single
    /// transaction: either all of them become visible or none do. The
    /// window's start/end labels are the first and last sample's time
    /// labels in submission order, stored verbatim. Returns the new
    /// window id.
    pub fn create_window(&mut self, request: &IngestRequest) -> Result<i64> {
        let samples = &request.samples;
        if samples.is_empty() {
            bail!("a window requires at least one sample");
        }
        let t_start = &samples[0].time;
        let t_end = &samples[samples.len() - 1].time;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO windows
                (created_at, device_id, sos_id, window_sec, hz, t_start, t_end, sample_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                Utc::now().to_rfc3339(),
                request.device_id,
                request.sos_id,
                request.window_sec,
                request.hz,
                t_start,
                t_end,
                samples.len() as i64,
            ],
        )?;
        let window_id = tx.last_insert_rowid();

        for (chunk_index, chunk) in samples.chunks(INSERT_BATCH_SIZE).enumerate() {
            let placeholders = vec!["(?, ?, ?, ?, ?, ?, ?, ?, ?)"; chunk.len()].join(", ");
            let sql = format!(
                "INSERT INTO samples
                    (window_id, seq, time, ax, ay, az, ppg_green, ppg_ir, ppg_red)
                 VALUES {placeholders}"
            );

            let base = (chunk_index * INSERT_BATCH_SIZE) as i64;
            let mut values: Vec<SqlValue> = Vec::with_capacity(chunk.len() * 9);
            for (offset, s) in chunk.iter().enumerate() {
                values.push(SqlValue::Integer(window_id));
                values.push(SqlValue::Integer(base + offset as i64));
                values.push(SqlValue::Text(s.time.clone()));
                values.push(SqlValue::Real(s.ax));
                values.push(SqlValue::Real(s.ay));
                values.push(SqlValue::Real(s.az));
                values.push(SqlValue::Integer(s.ppg_green));
                values.push(s.ppg_ir.map_or(SqlValue::Null, SqlValue::Integer));
                values.push(s.ppg_red.map_or(SqlValue::Null, SqlValue::Integer));
            }
            tx.execute(&sql, rusqlite::params_from_iter(values))?;
        }

        tx.commit()?;
        Ok(window_id)
    }

    /// Fetch a window by id.
    pub fn window_by_id(&self, id: i64) -> Result<Option<WindowRecord>> {
        self.conn
            .query_row(
                "SELECT id, created_at, device_id, sos_id, window_sec, hz,
                        t_start, t_end, sample_count
                 FROM windows WHERE id = ?",
                params![id],
                |row| {
                    Ok(WindowRecord {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        device_id: row.get(2)?,
                        sos_id: row.get(3)?,
                        window_sec: row.get(4)?,
                        hz: row.get(5)?,
                        t_start: row.get(6)?,
                        t_end: row.get(7)?,
                        sample_count: row.get(8)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Fetch all samples of a window, ordered by sequence number.
    pub fn samples_for_window(&self, window_id: i64) -> Result<Vec<SampleRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, time, ax, ay, az, ppg_green, ppg_ir, ppg_red
             FROM samples WHERE window_id = ? ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![window_id], |row| {
            Ok(SampleRecord {
                seq: row.get(0)?,
                time: row.get(1)?,
                ax: row.get(2)?,
                ay: row.get(3)?,
                az: row.get(4)?,
                ppg_green: row.get(5)?,
                ppg_ir: row.get(6)?,
                ppg_red: row.get(7)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Total number of stored windows.
    pub fn window_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM windows", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Total number of stored samples across all windows.
    pub fn sample_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Delete a window and, by cascade, all of its samples.
    ///
    /// Returns whether a window was actually deleted.
    pub fn delete_window(&mut self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM windows WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }
}
