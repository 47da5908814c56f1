//! Statistics from the record store and the failure ledgers
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics for the `stats` command.

use crate::config::Config;
use crate::crawler::pending_detail_ids;
use crate::ledger::read_ids;
use crate::storage::{RunRecord, Stage, Storage};
use crate::HarvestError;
use std::path::Path;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Number of catalog records
    pub catalog_records: u64,

    /// Number of detail records
    pub detail_records: u64,

    /// Catalog ids without a detail record
    pub pending_details: usize,

    /// Well-formed entries in the catalog ledger
    pub catalog_ledger_entries: usize,

    /// Well-formed entries in the detail ledger
    pub detail_ledger_entries: usize,

    /// Most recent run of each stage, in `Stage::ALL` order
    pub latest_runs: Vec<(Stage, Option<RunRecord>)>,
}

/// Loads statistics from storage and the configured ledgers
///
/// # Arguments
///
/// * `storage` - The record store to query
/// * `config` - Supplies the ledger paths
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - The store or a ledger could not be read
pub fn load_statistics(
    storage: &dyn Storage,
    config: &Config,
) -> Result<HarvestStatistics, HarvestError> {
    let catalog_records = storage.count_catalog()?;
    let detail_records = storage.count_details()?;
    let pending_details = pending_detail_ids(storage)?.len();

    let catalog_ledger_entries = read_ids(Path::new(&config.output.catalog_ledger_path))?.len();
    let detail_ledger_entries = read_ids(Path::new(&config.output.detail_ledger_path))?.len();

    let mut latest_runs = Vec::with_capacity(Stage::ALL.len());
    for stage in Stage::ALL {
        latest_runs.push((stage, storage.latest_run(stage)?));
    }

    Ok(HarvestStatistics {
        catalog_records,
        detail_records,
        pending_details,
        catalog_ledger_entries,
        detail_ledger_entries,
        latest_runs,
    })
}

/// Wall-clock duration of a finished run in seconds
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run.started_at.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
    let finished = run
        .finished_at
        .as_deref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Records:");
    println!("  Catalog records: {}", stats.catalog_records);
    println!("  Detail records: {}", stats.detail_records);
    println!("  Pending enrichment: {}", stats.pending_details);

    let coverage = if stats.catalog_records > 0 {
        (stats.detail_records as f64 / stats.catalog_records as f64) * 100.0
    } else {
        0.0
    };
    println!("  Detail coverage: {:.1}%", coverage);
    println!();

    println!("Failure Ledgers:");
    println!("  Catalog: {} entries", stats.catalog_ledger_entries);
    println!("  Detail: {} entries", stats.detail_ledger_entries);
    println!();

    println!("Latest Runs:");
    for (stage, run) in &stats.latest_runs {
        match run {
            Some(run) => {
                let duration = run_duration_seconds(run)
                    .map(|s| format!(", {}s", s))
                    .unwrap_or_default();
                println!(
                    "  {}: #{} {} (started {}{})",
                    stage,
                    run.id,
                    run.status.to_db_string(),
                    run.started_at,
                    duration
                );
            }
            None => println!("  {}: never", stage),
        }
    }
}
