//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track stage runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stage TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_stage ON runs(stage);

-- One row per discovered entity; the primary key is the uniqueness backstop
CREATE TABLE IF NOT EXISTS catalog_records (
    id TEXT PRIMARY KEY,
    standard_name TEXT NOT NULL,
    city TEXT NOT NULL,
    county TEXT NOT NULL,
    short_name TEXT NOT NULL,
    alias_name TEXT NOT NULL,
    used_name TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    discovered_run INTEGER
);

-- At most one detail row per catalog id
CREATE TABLE IF NOT EXISTS detail_records (
    id TEXT PRIMARY KEY,
    rome TEXT NOT NULL,
    use_time TEXT NOT NULL,
    full_name TEXT NOT NULL,
    origin TEXT NOT NULL,
    describe TEXT NOT NULL,
    remark TEXT NOT NULL,
    enriched_at TEXT NOT NULL,
    enriched_run INTEGER
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
