//! Storage module for persisting harvested records
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - The catalog and detail record collections
//! - Run tracking per stage

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::fmt;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Pipeline stage a run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Catalog,
    Detail,
    RetryCatalog,
    RetryDetail,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Catalog,
        Stage::Detail,
        Stage::RetryCatalog,
        Stage::RetryDetail,
    ];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Detail => "detail",
            Self::RetryCatalog => "retry-catalog",
            Self::RetryDetail => "retry-detail",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "catalog" => Some(Self::Catalog),
            "detail" => Some(Self::Detail),
            "retry-catalog" => Some(Self::RetryCatalog),
            "retry-detail" => Some(Self::RetryDetail),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Represents a stage run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub stage: Stage,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
