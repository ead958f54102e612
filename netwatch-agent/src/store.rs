//! Append-only time-series store
//!
//! Two independent series live in one SQLite database:
//! - `network_logs`: one row per host per network tick
//! - `system_resources`: one row per system tick
//!
//! Rows are never updated or deleted. Reads are either "latest row for a
//! host" or half-open `[start, end)` range scans ordered by timestamp.
//! The connection sits behind a mutex so both samplers and report
//! generation can share one `Store`.

use crate::model::{format_timestamp, parse_timestamp, Host, LinkStatus, NetworkSample, SystemSample};
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result of a "latest row for host" lookup
#[derive(Debug, Clone, PartialEq)]
pub enum HostReading {
    Seen(NetworkSample),
    Unknown,
}

type NetworkRow = (String, String, Option<f64>, Option<f64>, Option<f64>, String);
type SystemRow = (String, Option<f64>, f64, f64, f64);

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS network_logs (
        timestamp TEXT NOT NULL,
        host TEXT NOT NULL,
        latency REAL,
        jitter REAL,
        packet_loss REAL,
        status TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_network_timestamp ON network_logs(timestamp);
    CREATE INDEX IF NOT EXISTS idx_network_host_time ON network_logs(host, timestamp);

    CREATE TABLE IF NOT EXISTS system_resources (
        timestamp TEXT NOT NULL,
        cpu_temp REAL,
        cpu_usage REAL NOT NULL,
        ram_usage REAL NOT NULL,
        storage_usage REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_system_timestamp ON system_resources(timestamp);
"#;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database file, creating parent directories as needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        // WAL lets report reads proceed while a sampler is writing
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        debug!("Opened time-series store at {} (journal_mode={})", path.display(), mode);
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn append_network(&self, sample: &NetworkSample) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO network_logs (timestamp, host, latency, jitter, packet_loss, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                format_timestamp(&sample.timestamp),
                sample.host.name(),
                sample.latency,
                sample.jitter,
                sample.packet_loss,
                sample.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn append_system(&self, sample: &SystemSample) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO system_resources (timestamp, cpu_temp, cpu_usage, ram_usage, storage_usage)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                format_timestamp(&sample.timestamp),
                sample.cpu_temp,
                sample.cpu_usage,
                sample.ram_usage,
                sample.storage_usage,
            ],
        )?;
        Ok(())
    }

    /// Most recent network row for `host`
    pub fn latest(&self, host: Host) -> Result<HostReading, StoreError> {
        let row: Option<NetworkRow> = self
            .conn
            .lock()
            .query_row(
                "SELECT timestamp, host, latency, jitter, packet_loss, status FROM network_logs
                 WHERE host = ?1 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                params![host.name()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?)),
            )
            .optional()?;

        match row {
            Some(row) => Ok(HostReading::Seen(network_from_row(row)?)),
            None => Ok(HostReading::Unknown),
        }
    }

    /// Most recent system row, if any
    pub fn latest_system(&self) -> Result<Option<SystemSample>, StoreError> {
        let row: Option<SystemRow> = self
            .conn
            .lock()
            .query_row(
                "SELECT timestamp, cpu_temp, cpu_usage, ram_usage, storage_usage FROM system_resources
                 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        row.map(system_from_row).transpose()
    }

    /// Network rows with `start <= timestamp < end`, ascending
    pub fn range_network(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<NetworkSample>, StoreError> {
        let rows: Vec<NetworkRow> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT timestamp, host, latency, jitter, packet_loss, status FROM network_logs
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 ORDER BY timestamp ASC, rowid ASC",
            )?;
            let mapped = stmt.query_map(params![format_timestamp(&start), format_timestamp(&end)], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
            })?;
            let collected = mapped.collect::<Result<Vec<_>, _>>()?;
            collected
        };

        rows.into_iter().map(network_from_row).collect()
    }

    /// System rows with `start <= timestamp < end`, ascending
    pub fn range_system(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<SystemSample>, StoreError> {
        let rows: Vec<SystemRow> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT timestamp, cpu_temp, cpu_usage, ram_usage, storage_usage FROM system_resources
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 ORDER BY timestamp ASC, rowid ASC",
            )?;
            let mapped = stmt.query_map(params![format_timestamp(&start), format_timestamp(&end)], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?;
            let collected = mapped.collect::<Result<Vec<_>, _>>()?;
            collected
        };

        rows.into_iter().map(system_from_row).collect()
    }
}

fn network_from_row(row: NetworkRow) -> Result<NetworkSample, StoreError> {
    let (timestamp, host, latency, jitter, packet_loss, status) = row;
    let corrupt = |reason: String| StoreError::CorruptRow {
        table: "network_logs",
        reason,
    };

    Ok(NetworkSample {
        timestamp: parse_timestamp(&timestamp).map_err(|e| corrupt(format!("timestamp '{}': {}", timestamp, e)))?,
        host: host.parse::<Host>().map_err(|e| corrupt(e.to_string()))?,
        latency,
        jitter,
        packet_loss,
        status: status.parse::<LinkStatus>().map_err(|e| corrupt(e.to_string()))?,
    })
}

fn system_from_row(row: SystemRow) -> Result<SystemSample, StoreError> {
    let (timestamp, cpu_temp, cpu_usage, ram_usage, storage_usage) = row;
    let timestamp = parse_timestamp(&timestamp).map_err(|e| StoreError::CorruptRow {
        table: "system_resources",
        reason: format!("timestamp '{}': {}", timestamp, e),
    })?;

    Ok(SystemSample {
        timestamp,
        cpu_temp,
        cpu_usage,
        ram_usage,
        storage_usage,
    })
}
