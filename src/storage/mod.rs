//! Table store.
//!
//! Persists named tables and loads them back:
//! - SQLite database (one SQL table per name)
//! - Parquet files (one file per name)
//! - In-memory map (tests and dry runs)
//!
//! [`TableStore`] is the adapter the pipeline talks to. It never returns an
//! error: failed loads come back as `None` and failed saves as `false`, each
//! with a log line.

pub mod memory;
pub mod parquet;
pub mod schema;
pub mod sqlite;

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub use memory::MemoryBackend;
pub use parquet::ParquetBackend;
pub use schema::{Column, ColumnSpec, ColumnType, Record, RowReader, SchemaError, Table, Value};
pub use sqlite::SqliteBackend;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Table name pattern error: {0}")]
    Pattern(regex::Error),

    #[error("Unsupported column type for '{column}': {data_type}")]
    UnsupportedType { column: String, data_type: String },

    #[error("Store is read-only")]
    ReadOnly,
}

/// Which backend holds the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Parquet,
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "parquet" => Ok(BackendKind::Parquet),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Directory holding one Parquet file per table.
    pub fn parquet_dir(&self) -> PathBuf {
        self.data_dir.join("tables")
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("arena.db")
    }

    /// Directory for CSV exports of collected raw data.
    pub fn out_dir(&self) -> PathBuf {
        self.data_dir.join("out")
    }

    pub fn report_dir(&self) -> PathBuf {
        self.data_dir.join("report")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// Table names end up in SQL statements and file names.
pub fn validate_table_name(name: &str) -> Result<(), StorageError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$"))
        .as_ref()
        .map_err(|e| StorageError::Pattern(e.clone()))?;
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(StorageError::InvalidTableName(name.to_string()))
    }
}

/// A physical place tables live in.
pub trait TableBackend: Send + Sync {
    /// Load a table, `Ok(None)` when no table exists under `name`.
    fn load(&self, name: &str) -> Result<Option<Table>, StorageError>;

    /// Replace whatever is stored under `name` with `table`.
    fn save(&self, name: &str, table: &Table) -> Result<(), StorageError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Load/save adapter with log-and-continue semantics.
pub struct TableStore {
    backend: Box<dyn TableBackend>,
}

impl TableStore {
    pub fn new(backend: Box<dyn TableBackend>) -> Self {
        Self { backend }
    }

    /// Open the configured backend.
    pub fn open(kind: BackendKind, config: &StorageConfig) -> Self {
        let backend: Box<dyn TableBackend> = match kind {
            BackendKind::Sqlite => Box::new(SqliteBackend::new(config.sqlite_path())),
            BackendKind::Parquet => Box::new(ParquetBackend::new(config.parquet_dir())),
            BackendKind::Memory => Box::new(MemoryBackend::new()),
        };
        info!("Table store: {}", backend.describe());
        Self::new(backend)
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Load a raw table; `None` if it is missing or unreadable.
    pub fn load_table(&self, name: &str) -> Option<Table> {
        match self.backend.load(name) {
            Ok(Some(table)) => {
                info!("Table '{}' loaded: {} rows", name, table.num_rows());
                Some(table)
            }
            Ok(None) => {
                debug!("Table '{}' not found in {}", name, self.backend.describe());
                None
            }
            Err(e) => {
                warn!("Could not load table '{}': {}", name, e);
                None
            }
        }
    }

    /// Load a table and decode it into records; `None` on any failure.
    pub fn load<R: Record>(&self, name: &str) -> Option<Vec<R>> {
        let table = self.load_table(name)?;
        match table.to_records::<R>() {
            Ok(records) => Some(records),
            Err(e) => {
                warn!("Table '{}' does not match its schema: {}", name, e);
                None
            }
        }
    }

    /// Replace a table. Returns whether the write succeeded.
    pub fn save_table(&self, name: &str, table: &Table) -> bool {
        match self.backend.save(name, table) {
            Ok(()) => {
                info!(
                    "Table '{}' saved: {} rows (fingerprint {})",
                    name,
                    table.num_rows(),
                    &table.fingerprint()[..12]
                );
                true
            }
            Err(e) => {
                error!("Failed to save table '{}': {}", name, e);
                false
            }
        }
    }

    /// Encode records and replace the table.
    pub fn save<R: Record>(&self, name: &str, records: &[R]) -> bool {
        self.save_table(name, &Table::from_records(records))
    }
}
