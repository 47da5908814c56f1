//! Harvester - stage orchestration
//!
//! This module wires the crawlers to the store, the ledgers and the worker
//! pool, and wraps every stage invocation in a tracked run:
//! - Opening a run row before the stage starts
//! - Tagging records created by the stage with the run id
//! - Closing the run as completed, cancelled or failed

use crate::config::Config;
use crate::crawler::catalog::{CatalogCrawler, CatalogRunSummary};
use crate::crawler::detail::{DetailCrawler, DetailRunSummary};
use crate::crawler::gap::pending_detail_ids;
use crate::crawler::pool::WorkPool;
use crate::crawler::DocumentFetcher;
use crate::ledger::FailureLedger;
use crate::retry::{retry_with_cancel, RetryOperation, RetryReport};
use crate::storage::{RunStatus, Stage, Storage};
use crate::HarvestError;
use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A crawl stage that owns a failure ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStage {
    Catalog,
    Detail,
}

impl CrawlStage {
    /// Run stage recorded for a retry pass over this stage's ledger
    pub fn retry_stage(&self) -> Stage {
        match self {
            Self::Catalog => Stage::RetryCatalog,
            Self::Detail => Stage::RetryDetail,
        }
    }
}

impl fmt::Display for CrawlStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog => f.write_str("catalog"),
            Self::Detail => f.write_str("detail"),
        }
    }
}

/// Process-scoped handle to one harvest setup
pub struct Harvester {
    config: Config,
    config_hash: String,
    storage: Arc<dyn Storage>,
    fetcher: Arc<dyn DocumentFetcher>,
    catalog_ledger: Arc<FailureLedger>,
    detail_ledger: Arc<FailureLedger>,
    pool: WorkPool,
}

impl Harvester {
    /// Creates a harvester
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded and validated configuration
    /// * `storage` - The record store, shared by every stage
    /// * `fetcher` - Document source for list and detail pages
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        let catalog_ledger = Arc::new(FailureLedger::new(&config.output.catalog_ledger_path));
        let detail_ledger = Arc::new(FailureLedger::new(&config.output.detail_ledger_path));
        let pool = WorkPool::new(config.crawler.max_concurrent_fetches as usize);

        Self {
            config,
            config_hash: String::new(),
            storage,
            fetcher,
            catalog_ledger,
            detail_ledger,
            pool,
        }
    }

    /// Records `hash` on every run this harvester opens
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn ledger(&self, stage: CrawlStage) -> &Arc<FailureLedger> {
        match stage {
            CrawlStage::Catalog => &self.catalog_ledger,
            CrawlStage::Detail => &self.detail_ledger,
        }
    }

    fn catalog_crawler(&self, run_id: i64) -> CatalogCrawler {
        CatalogCrawler::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.storage),
            Arc::clone(&self.catalog_ledger),
            &self.config,
        )
        .with_run(run_id)
    }

    fn detail_crawler(&self, run_id: i64) -> DetailCrawler {
        DetailCrawler::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.storage),
            Arc::clone(&self.detail_ledger),
            &self.config,
        )
        .with_run(run_id)
    }

    /// Ids in the catalog that have no detail record yet
    pub fn pending_ids(&self) -> Result<HashSet<String>, HarvestError> {
        Ok(pending_detail_ids(self.storage.as_ref())?)
    }

    /// Runs the catalog stage over `pages`
    pub async fn crawl_catalog(
        &self,
        pages: RangeInclusive<u32>,
        cancel: &CancellationToken,
    ) -> Result<CatalogRunSummary, HarvestError> {
        let run_id = self.storage.create_run(Stage::Catalog, &self.config_hash)?;
        tracing::info!("Starting catalog run {}", run_id);
        let start_time = Instant::now();

        let crawler = Arc::new(self.catalog_crawler(run_id));
        let result = crawler.crawl_pages(pages, &self.pool, cancel).await;
        let summary = self.close_run(run_id, result, |s| s.cancelled)?;

        tracing::info!(
            "Catalog run {} finished in {:?}: {} pages ({} failed), {} new records, {} already present, {} rows without id",
            run_id,
            start_time.elapsed(),
            summary.pages_attempted,
            summary.pages_failed,
            summary.records_inserted,
            summary.rows_already_present + summary.duplicate_races,
            summary.rows_without_id
        );

        Ok(summary)
    }

    /// Runs the detail stage over the current gap
    ///
    /// The gap is recomputed from the store on every call.
    pub async fn enrich_pending(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DetailRunSummary, HarvestError> {
        let run_id = self.storage.create_run(Stage::Detail, &self.config_hash)?;
        tracing::info!("Starting detail run {}", run_id);
        let start_time = Instant::now();

        let result = match self.pending_ids() {
            Ok(pending) => {
                let mut ids: Vec<String> = pending.into_iter().collect();
                ids.sort();
                let crawler = Arc::new(self.detail_crawler(run_id));
                crawler.enrich_all(ids, &self.pool, cancel).await
            }
            Err(e) => Err(e),
        };
        let summary = self.close_run(run_id, result, |s| s.cancelled)?;

        tracing::info!(
            "Detail run {} finished in {:?}: {} ids, {} enriched, {} already present, {} failed",
            run_id,
            start_time.elapsed(),
            summary.attempted,
            summary.inserted,
            summary.already_present,
            summary.failed
        );

        Ok(summary)
    }

    /// Replays a stage ledger
    ///
    /// # Arguments
    ///
    /// * `stage` - Which crawl operation to replay through
    /// * `ledger_override` - Ledger to read instead of the stage's configured one
    /// * `relog` - Append ids that fail again to the stage's configured ledger
    /// * `cancel` - Stops the pass before the next id
    pub async fn retry_stage(
        &self,
        stage: CrawlStage,
        ledger_override: Option<&Path>,
        relog: bool,
        cancel: &CancellationToken,
    ) -> Result<RetryReport, HarvestError> {
        let path: PathBuf = match ledger_override {
            Some(path) => path.to_path_buf(),
            None => self.ledger(stage).path().to_path_buf(),
        };

        let run_id = self
            .storage
            .create_run(stage.retry_stage(), &self.config_hash)?;
        tracing::info!(
            "Starting {} retry run {} from {}",
            stage,
            run_id,
            path.display()
        );

        let operation: Box<dyn RetryOperation> = match stage {
            CrawlStage::Catalog => Box::new(self.catalog_crawler(run_id)),
            CrawlStage::Detail => Box::new(self.detail_crawler(run_id)),
        };
        let result = retry_with_cancel(&path, operation.as_ref(), cancel).await;
        let report = self.close_run(run_id, result, |r| r.cancelled)?;

        if relog && report.failed() > 0 {
            let written = report.relog_failures(self.ledger(stage))?;
            tracing::info!(
                "Re-logged {} failures to {}",
                written,
                self.ledger(stage).path().display()
            );
        }

        Ok(report)
    }

    /// Closes a run according to how the stage ended
    fn close_run<T>(
        &self,
        run_id: i64,
        result: Result<T, HarvestError>,
        cancelled: impl Fn(&T) -> bool,
    ) -> Result<T, HarvestError> {
        let status = match &result {
            Ok(value) if cancelled(value) => RunStatus::Cancelled,
            Ok(_) => RunStatus::Completed,
            Err(_) => RunStatus::Failed,
        };

        if let Err(e) = self.storage.finish_run(run_id, status) {
            tracing::error!("Failed to close run {}: {}", run_id, e);
            if result.is_ok() {
                return Err(e.into());
            }
        }

        result
    }
}
