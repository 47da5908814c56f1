//! Ledger replay
//!
//! A retry pass reads every id from a stage ledger and runs it once through
//! that stage's operation, in ledger order. Item failures are collected in the
//! report; they are not written back to the ledger unless the caller asks for
//! it with [`RetryReport::relog_failures`].

use crate::ledger::{read_ids, FailureLedger, LedgerError};
use crate::HarvestError;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// One crawl step keyed by a single identifier
///
/// Implemented by the catalog crawler (page ids) and the detail crawler
/// (record ids). Implementations must not write to a ledger themselves.
#[async_trait]
pub trait RetryOperation: Send + Sync {
    async fn attempt(&self, id: &str) -> Result<(), HarvestError>;
}

/// How one replayed id went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Succeeded,
    /// The error message from the failed attempt
    Failed(String),
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEntry {
    pub id: String,
    pub outcome: RetryOutcome,
}

/// Per-id results of a retry pass, in ledger order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub entries: Vec<RetryEntry>,
    /// Set when cancellation stopped the pass before every id was tried
    pub cancelled: bool,
}

impl RetryReport {
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RetryEntry> {
        self.entries.iter().filter(|e| !e.outcome.is_success())
    }

    /// Appends every failed entry to `ledger`
    ///
    /// Returns the number of entries written.
    pub fn relog_failures(&self, ledger: &FailureLedger) -> Result<usize, LedgerError> {
        let mut written = 0;
        for entry in self.failures() {
            if let RetryOutcome::Failed(message) = &entry.outcome {
                ledger.append(&entry.id, message)?;
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Replays the ledger at `path` through `operation`
///
/// # Returns
///
/// * `Ok(RetryReport)` - Every id was attempted once
/// * `Err(HarvestError::LedgerIo)` - The ledger could not be read
/// * `Err(HarvestError::Store)` - The store failed; remaining ids were not tried
pub async fn retry(
    path: &Path,
    operation: &dyn RetryOperation,
) -> Result<RetryReport, HarvestError> {
    retry_with_cancel(path, operation, &CancellationToken::new()).await
}

/// [`retry`] that stops before the next id once `cancel` fires
pub async fn retry_with_cancel(
    path: &Path,
    operation: &dyn RetryOperation,
    cancel: &CancellationToken,
) -> Result<RetryReport, HarvestError> {
    let ids = read_ids(path)?;
    tracing::info!("Retrying {} ledger entries from {}", ids.len(), path.display());

    let mut report = RetryReport::default();
    for id in ids {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let outcome = match operation.attempt(&id).await {
            Ok(()) => {
                tracing::debug!("Retry of {} succeeded", id);
                RetryOutcome::Succeeded
            }
            Err(e) if e.is_structural() => {
                tracing::error!("Retry aborted at {}: {}", id, e);
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("Retry of {} failed: {}", id, e);
                RetryOutcome::Failed(e.to_string())
            }
        };
        report.entries.push(RetryEntry { id, outcome });
    }

    tracing::info!(
        "Retry finished: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );

    Ok(report)
}
