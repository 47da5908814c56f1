//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::records::{CatalogRecord, Collection, DetailRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, Stage};
use chrono::Utc;
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// The connection sits behind a mutex so one handle can be shared by every
/// worker task; it is closed when the storage is dropped.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }

    fn ids(&self, collection: Collection) -> StorageResult<HashSet<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT id FROM {}", collection.table_name()))?;

        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(ids)
    }

    fn count(&self, collection: Collection) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", collection.table_name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Maps a primary-key violation to `DuplicateKey`
///
/// Other constraint failures (NOT NULL, CHECK) are real errors and pass
/// through unchanged.
fn map_insert_error(err: rusqlite::Error, collection: Collection, id: &str) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            StorageError::duplicate(collection, id)
        }
        _ => StorageError::Sqlite(err),
    }
}

fn catalog_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
    Ok(CatalogRecord {
        id: row.get(0)?,
        standard_name: row.get(1)?,
        city: row.get(2)?,
        county: row.get(3)?,
        short_name: row.get(4)?,
        alias_name: row.get(5)?,
        used_name: row.get(6)?,
    })
}

fn detail_from_row(row: &Row<'_>) -> rusqlite::Result<DetailRecord> {
    Ok(DetailRecord {
        id: row.get(0)?,
        rome: row.get(1)?,
        use_time: row.get(2)?,
        full_name: row.get(3)?,
        origin: row.get(4)?,
        describe: row.get(5)?,
        remark: row.get(6)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        stage: Stage::from_db_string(&row.get::<_, String>(1)?).unwrap_or(Stage::Catalog),
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl Storage for SqliteStorage {
    // ===== Catalog Collection =====

    fn find_catalog(&self, id: &str) -> StorageResult<Option<CatalogRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT id, standard_name, city, county, short_name, alias_name, used_name
                 FROM catalog_records WHERE id = ?1",
                params![id],
                catalog_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn insert_catalog(&self, record: &CatalogRecord, run_id: Option<i64>) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO catalog_records
             (id, standard_name, city, county, short_name, alias_name, used_name, discovered_at, discovered_run)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.standard_name,
                record.city,
                record.county,
                record.short_name,
                record.alias_name,
                record.used_name,
                now,
                run_id
            ],
        )
        .map_err(|e| map_insert_error(e, Collection::Catalog, &record.id))?;
        Ok(())
    }

    fn catalog_ids(&self) -> StorageResult<HashSet<String>> {
        self.ids(Collection::Catalog)
    }

    fn count_catalog(&self) -> StorageResult<u64> {
        self.count(Collection::Catalog)
    }

    // ===== Detail Collection =====

    fn find_detail(&self, id: &str) -> StorageResult<Option<DetailRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT id, rome, use_time, full_name, origin, describe, remark
                 FROM detail_records WHERE id = ?1",
                params![id],
                detail_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn insert_detail(&self, record: &DetailRecord, run_id: Option<i64>) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO detail_records
             (id, rome, use_time, full_name, origin, describe, remark, enriched_at, enriched_run)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.rome,
                record.use_time,
                record.full_name,
                record.origin,
                record.describe,
                record.remark,
                now,
                run_id
            ],
        )
        .map_err(|e| map_insert_error(e, Collection::Detail, &record.id))?;
        Ok(())
    }

    fn detail_ids(&self) -> StorageResult<HashSet<String>> {
        self.ids(Collection::Detail)
    }

    fn count_details(&self) -> StorageResult<u64> {
        self.count(Collection::Detail)
    }

    // ===== Run Management =====

    fn create_run(&self, stage: Stage, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO runs (stage, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                stage.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, stage, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
            params![run_id],
            run_from_row,
        )
        .optional()?
        .ok_or(StorageError::RunNotFound(run_id))
    }

    fn latest_run(&self, stage: Stage) -> StorageResult<Option<RunRecord>> {
        let conn = self.conn()?;
        let run = conn
            .query_row(
                "SELECT id, stage, started_at, finished_at, config_hash, status
                 FROM runs WHERE stage = ?1 ORDER BY id DESC LIMIT 1",
                params![stage.to_db_string()],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }
}
