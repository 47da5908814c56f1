//! Storage traits and error types
//!
//! This module defines the trait interface for the record store and its
//! error types.

use crate::records::{CatalogRecord, Collection, DetailRecord};
use crate::storage::{RunRecord, RunStatus, Stage};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Duplicate {collection} record: {id}")]
    DuplicateKey { collection: String, id: String },

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    pub(crate) fn duplicate(collection: Collection, id: &str) -> Self {
        Self::DuplicateKey {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for record store implementations
///
/// Implementations are shared across worker tasks, so every method takes
/// `&self` and the backend serializes access internally. Inserts never
/// overwrite: a second insert of the same id fails with
/// [`StorageError::DuplicateKey`].
pub trait Storage: Send + Sync {
    // ===== Catalog Collection =====

    /// Finds a catalog record by id
    fn find_catalog(&self, id: &str) -> StorageResult<Option<CatalogRecord>>;

    /// Inserts a catalog record
    ///
    /// # Arguments
    ///
    /// * `record` - The record to persist
    /// * `run_id` - The run that discovered it, if any
    fn insert_catalog(&self, record: &CatalogRecord, run_id: Option<i64>) -> StorageResult<()>;

    /// All ids in the catalog collection
    fn catalog_ids(&self) -> StorageResult<HashSet<String>>;

    /// Counts catalog records
    fn count_catalog(&self) -> StorageResult<u64>;

    // ===== Detail Collection =====

    /// Finds a detail record by id
    fn find_detail(&self, id: &str) -> StorageResult<Option<DetailRecord>>;

    /// Inserts a detail record
    fn insert_detail(&self, record: &DetailRecord, run_id: Option<i64>) -> StorageResult<()>;

    /// All ids in the detail collection
    fn detail_ids(&self) -> StorageResult<HashSet<String>>;

    /// Counts detail records
    fn count_details(&self) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Opens a run for the given stage and returns its id
    fn create_run(&self, stage: Stage, config_hash: &str) -> StorageResult<i64>;

    /// Closes a run with its final status
    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Most recent run of a stage
    fn latest_run(&self, stage: Stage) -> StorageResult<Option<RunRecord>>;
}
