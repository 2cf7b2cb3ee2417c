// crates/correlator-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Lineage Store
// Description: Connection management, configuration, and schema for the
//              SQLite-backed lineage store.
// Purpose: Own the writer connection, the read pool, and schema versioning.
// Dependencies: correlator-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! One writer connection behind a mutex serializes all mutations; a small
//! pool of read-only connections serves queries under WAL snapshot
//! isolation. The schema is versioned through a `store_meta` table so future
//! migrations run inside one transaction at open time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use correlator_core::IngestError;
use correlator_core::StoreError;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default read connection pool size.
const DEFAULT_READ_POOL_SIZE: usize = 4;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` lineage store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `read_pool_size` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections used for read path isolation.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl SqliteStoreConfig {
    /// Creates a configuration with defaults for the given database path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw event payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Transient engine contention; callers may retry.
    #[error("sqlite store busy: {0}")]
    Busy(String),
    /// Uniqueness or check constraint violation.
    #[error("sqlite store constraint violation: {0}")]
    Constraint(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl SqliteStoreError {
    /// Classifies a `rusqlite` error into the store taxonomy.
    pub(crate) fn from_sqlite(error: &rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = error {
            let text = message.clone().unwrap_or_else(|| failure.to_string());
            return match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Self::Busy(text),
                ErrorCode::ConstraintViolation => Self::Constraint(text),
                ErrorCode::DiskFull | ErrorCode::CannotOpen | ErrorCode::ReadOnly => Self::Io(text),
                _ => Self::Db(text),
            };
        }
        Self::Db(error.to_string())
    }
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) | SqliteStoreError::Busy(message) => Self::Db(message),
            SqliteStoreError::Constraint(message) | SqliteStoreError::Invalid(message) => {
                Self::Invalid(message)
            }
        }
    }
}

impl From<SqliteStoreError> for IngestError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Busy(message) => Self::Transient(message),
            SqliteStoreError::Constraint(message) => Self::Conflict(message),
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => {
                Self::Transient(message)
            }
            SqliteStoreError::Invalid(message) => Self::Internal(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed lineage store with WAL support.
///
/// # Invariants
/// - All mutations run on the single writer connection inside one
///   transaction per event.
/// - Read connections are read-only and never observe partial transactions.
#[derive(Clone)]
pub struct SqliteLineageStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Read-only connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteLineageStore {
    /// Opens (and if necessary creates) the store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened, the
    /// pragmas cannot be applied, or the schema cannot be initialized.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if config.read_pool_size == 0 {
            return Err(SqliteStoreError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        let mut write_connection = open_connection(&config, false)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0..config.read_pool_size {
            read_connections.push(Mutex::new(open_connection(&config, true)?));
        }
        Ok(Self {
            config,
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Verifies the store is reachable by running a trivial read.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the probe query fails.
    pub fn ping(&self) -> Result<(), SqliteStoreError> {
        let guard = self.read_connection()?;
        guard
            .query_row("SELECT 1", params![], |row| row.get::<_, i64>(0))
            .map_err(|err| SqliteStoreError::from_sqlite(&err))?;
        Ok(())
    }

    /// Acquires the writer connection.
    pub(crate) fn write_connection(
        &self,
    ) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Invalid("writer lock poisoned".to_string()))
    }

    /// Acquires a read connection by round-robin selection.
    pub(crate) fn read_connection(
        &self,
    ) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.read_connections.len();
        self.read_connections[index]
            .lock()
            .map_err(|_| SqliteStoreError::Invalid("read lock poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Opens one connection with the configured pragmas applied.
fn open_connection(
    config: &SqliteStoreConfig,
    read_only: bool,
) -> Result<Connection, SqliteStoreError> {
    let flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    };
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::from_sqlite(&err))?;
    connection
        .pragma_update(None, "journal_mode", config.journal_mode.pragma_value())
        .map_err(|err| SqliteStoreError::from_sqlite(&err))?;
    connection
        .pragma_update(None, "synchronous", config.sync_mode.pragma_value())
        .map_err(|err| SqliteStoreError::from_sqlite(&err))?;
    Ok(connection)
}

/// Initializes or upgrades the store schema inside one transaction.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::from_sqlite(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::from_sqlite(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::from_sqlite(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::from_sqlite(&err))?;
            tx.execute_batch(SCHEMA_SQL).map_err(|err| SqliteStoreError::from_sqlite(&err))?;
        }
        Some(SCHEMA_VERSION) => {}
        Some(found) => {
            return Err(SqliteStoreError::Invalid(format!(
                "unsupported store schema version {found} (expected {SCHEMA_VERSION})"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::from_sqlite(&err))
}

/// Schema for store version 1.
///
/// Timestamps are stored as epoch nanoseconds. The three correlation views
/// are refresh-rebuilt tables because `SQLite` has no materialized views;
/// WAL snapshot isolation keeps the rebuild invisible to readers until
/// commit. `SQLite` also lacks trigram indexes, so orphan likely-match
/// lookup is exact table-name equality served by `idx_datasets_name`.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS job_runs (
    job_run_id TEXT PRIMARY KEY,
    raw_run_id TEXT NOT NULL,
    job_name TEXT NOT NULL,
    job_namespace TEXT NOT NULL,
    current_state TEXT,
    event_type TEXT NOT NULL,
    event_time_ns INTEGER NOT NULL,
    started_at_ns INTEGER NOT NULL,
    completed_at_ns INTEGER,
    producer_name TEXT NOT NULL,
    producer_version TEXT,
    parent_run_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_job_runs_parent ON job_runs (parent_run_id);

CREATE TABLE IF NOT EXISTS datasets (
    dataset_urn TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    namespace TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_datasets_name ON datasets (name);

CREATE TABLE IF NOT EXISTS lineage_edges (
    job_run_id TEXT NOT NULL,
    dataset_urn TEXT NOT NULL,
    edge_type TEXT NOT NULL CHECK (edge_type IN ('input', 'output')),
    PRIMARY KEY (job_run_id, dataset_urn, edge_type)
);
CREATE INDEX IF NOT EXISTS idx_lineage_edges_dataset ON lineage_edges (dataset_urn, edge_type);

CREATE TABLE IF NOT EXISTS test_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_name TEXT NOT NULL,
    test_type TEXT NOT NULL,
    dataset_urn TEXT NOT NULL,
    job_run_id TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('passed', 'failed', 'error', 'skipped')),
    message TEXT,
    executed_at_ns INTEGER NOT NULL,
    duration_ms INTEGER,
    producer_name TEXT NOT NULL,
    UNIQUE (job_run_id, test_name, dataset_urn, executed_at_ns)
);
CREATE INDEX IF NOT EXISTS idx_test_results_dataset ON test_results (dataset_urn);
CREATE INDEX IF NOT EXISTS idx_test_results_status ON test_results (status);

CREATE TABLE IF NOT EXISTS lineage_event_idempotency (
    fingerprint TEXT PRIMARY KEY,
    producer_name TEXT NOT NULL,
    job_run_id TEXT NOT NULL,
    event_time_ns INTEGER NOT NULL,
    recorded_at_ns INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_idempotency_recorded
    ON lineage_event_idempotency (recorded_at_ns);

CREATE TABLE IF NOT EXISTS incident_correlation_view (
    test_result_id INTEGER PRIMARY KEY,
    test_name TEXT NOT NULL,
    test_type TEXT NOT NULL,
    status TEXT NOT NULL,
    message TEXT,
    executed_at_ns INTEGER NOT NULL,
    dataset_urn TEXT NOT NULL,
    dataset_name TEXT NOT NULL,
    dataset_namespace TEXT NOT NULL,
    test_producer TEXT NOT NULL,
    job_run_id TEXT,
    job_name TEXT,
    job_namespace TEXT,
    job_state TEXT,
    job_completed_at_ns INTEGER,
    job_producer TEXT,
    parent_run_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_icv_executed ON incident_correlation_view (executed_at_ns);
CREATE INDEX IF NOT EXISTS idx_icv_job ON incident_correlation_view (job_run_id);

CREATE TABLE IF NOT EXISTS lineage_impact_analysis (
    job_run_id TEXT NOT NULL,
    dataset_urn TEXT NOT NULL,
    dataset_name TEXT NOT NULL,
    depth INTEGER NOT NULL,
    PRIMARY KEY (job_run_id, dataset_urn)
);
CREATE INDEX IF NOT EXISTS idx_impact_depth ON lineage_impact_analysis (job_run_id, depth);

CREATE TABLE IF NOT EXISTS recent_incidents_summary (
    job_run_id TEXT PRIMARY KEY,
    job_name TEXT NOT NULL,
    job_namespace TEXT NOT NULL,
    producer_name TEXT NOT NULL,
    failed_tests INTEGER NOT NULL,
    error_tests INTEGER NOT NULL,
    datasets_affected INTEGER NOT NULL,
    last_failure_at_ns INTEGER NOT NULL
);
";

// ============================================================================
// SECTION: Time Mapping
// ============================================================================

/// Converts a timestamp to stored epoch nanoseconds.
pub(crate) fn to_ns(time: OffsetDateTime) -> Result<i64, SqliteStoreError> {
    i64::try_from(time.unix_timestamp_nanos())
        .map_err(|_| SqliteStoreError::Invalid("timestamp outside storable range".to_string()))
}

/// Converts stored epoch nanoseconds back to a timestamp.
pub(crate) fn from_ns(ns: i64) -> Result<OffsetDateTime, SqliteStoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ns))
        .map_err(|_| SqliteStoreError::Invalid("stored timestamp out of range".to_string()))
}
