//! Catalog stage: list pages -> catalog records
//!
//! A page scan fetches one list page, extracts its rows and inserts every
//! record whose id is not stored yet. Scanning the same page again changes
//! nothing, so pages can be re-run or retried freely.

use crate::config::{Config, LayoutConfig, SourceConfig};
use crate::crawler::parser::parse_list_page;
use crate::crawler::pool::WorkPool;
use crate::crawler::DocumentFetcher;
use crate::ledger::FailureLedger;
use crate::links::list_page_url;
use crate::records::CatalogRecord;
use crate::retry::RetryOperation;
use crate::storage::Storage;
use crate::HarvestError;
use async_trait::async_trait;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What happened to a single row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    /// The existence check found the id
    AlreadyPresent,
    /// The existence check missed it but the store's unique key caught it
    DuplicateRace,
}

/// Row counts for one scanned page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScan {
    pub rows_seen: usize,
    pub inserted: usize,
    pub already_present: usize,
    pub duplicate_races: usize,
    pub rows_without_id: usize,
}

impl PageScan {
    fn record(&mut self, outcome: RowOutcome) {
        self.rows_seen += 1;
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::AlreadyPresent => self.already_present += 1,
            RowOutcome::DuplicateRace => self.duplicate_races += 1,
        }
    }
}

/// Result of a page scan once item failures have been ledgered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Scanned(PageScan),
    /// Fetch or parse failed; the page is in the catalog ledger
    Failed(String),
}

/// Totals for a catalog run over a page range
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRunSummary {
    pub pages_attempted: usize,
    pub pages_failed: usize,
    pub rows_seen: usize,
    pub records_inserted: usize,
    pub rows_already_present: usize,
    pub rows_without_id: usize,
    pub duplicate_races: usize,
    pub cancelled: bool,
}

impl CatalogRunSummary {
    fn absorb(&mut self, outcome: &PageOutcome) {
        self.pages_attempted += 1;
        match outcome {
            PageOutcome::Scanned(scan) => {
                self.rows_seen += scan.rows_seen;
                self.records_inserted += scan.inserted;
                self.rows_already_present += scan.already_present;
                self.rows_without_id += scan.rows_without_id;
                self.duplicate_races += scan.duplicate_races;
            }
            PageOutcome::Failed(_) => self.pages_failed += 1,
        }
    }
}

/// Walks list pages and fills the catalog collection
pub struct CatalogCrawler {
    fetcher: Arc<dyn DocumentFetcher>,
    storage: Arc<dyn Storage>,
    ledger: Arc<FailureLedger>,
    source: SourceConfig,
    layout: LayoutConfig,
    run_id: Option<i64>,
}

impl CatalogCrawler {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        storage: Arc<dyn Storage>,
        ledger: Arc<FailureLedger>,
        config: &Config,
    ) -> Self {
        Self {
            fetcher,
            storage,
            ledger,
            source: config.source.clone(),
            layout: config.layout.clone(),
            run_id: None,
        }
    }

    /// Tags records inserted by this crawler with `run_id`
    pub fn with_run(mut self, run_id: i64) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    /// Scans one list page without touching the ledger
    ///
    /// # Returns
    ///
    /// * `Ok(PageScan)` - Every row was handled
    /// * `Err(HarvestError::Fetch | Parse)` - The page could not be read
    /// * `Err(HarvestError::Store)` - The store failed mid-page
    pub async fn try_scan_page(&self, page: u32) -> Result<PageScan, HarvestError> {
        let url = list_page_url(&self.source.list_url_template, page);
        let page_url = Url::parse(&url)
            .map_err(|e| HarvestError::InvalidId(format!("page {} -> {}: {}", page, url, e)))?;

        let body = self.fetcher.fetch(&url).await?;
        let parsed = parse_list_page(&body, &page_url, &self.layout, &self.source.id_query_param)?;

        let mut scan = PageScan {
            rows_without_id: parsed.rows_without_id,
            ..PageScan::default()
        };
        for record in &parsed.records {
            scan.record(self.persist_row(record)?);
        }

        tracing::debug!(
            "Page {}: {} rows, {} new, {} already present, {} without id",
            page,
            scan.rows_seen,
            scan.inserted,
            scan.already_present,
            scan.rows_without_id
        );

        Ok(scan)
    }

    /// Scans one list page, ledgering fetch and parse failures
    ///
    /// Item failures come back as `PageOutcome::Failed`; only structural
    /// errors (store, ledger) are returned as `Err`.
    pub async fn scan_list_page(&self, page: u32) -> Result<PageOutcome, HarvestError> {
        match self.try_scan_page(page).await {
            Ok(scan) => Ok(PageOutcome::Scanned(scan)),
            Err(e) if e.is_item_failure() => {
                tracing::warn!("Error scraping page {}: {}", page, e);
                self.ledger.record(page.to_string(), e.to_string()).await?;
                Ok(PageOutcome::Failed(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Existence check then insert, as one unit per id
    ///
    /// The check is only an optimization: a concurrent run can insert the
    /// same id in between, in which case the store's unique key rejects the
    /// second insert and the row counts as a duplicate race.
    pub fn persist_row(&self, record: &CatalogRecord) -> Result<RowOutcome, HarvestError> {
        if self.storage.find_catalog(&record.id)?.is_some() {
            tracing::debug!("Entry with id {} already exists, skipping", record.id);
            return Ok(RowOutcome::AlreadyPresent);
        }

        match self.storage.insert_catalog(record, self.run_id) {
            Ok(()) => Ok(RowOutcome::Inserted),
            Err(e) => match HarvestError::from(e) {
                HarvestError::DuplicateKey { id, .. } => {
                    tracing::warn!("Entry with id {} was inserted concurrently, skipping", id);
                    Ok(RowOutcome::DuplicateRace)
                }
                other => Err(other),
            },
        }
    }

    /// Scans every page of `pages` through the pool
    ///
    /// Returns after all dispatched pages finished. A structural error stops
    /// dispatch and is returned once in-flight pages have drained.
    pub async fn crawl_pages(
        self: &Arc<Self>,
        pages: RangeInclusive<u32>,
        pool: &WorkPool,
        cancel: &CancellationToken,
    ) -> Result<CatalogRunSummary, HarvestError> {
        let total = pages.clone().count();
        tracing::info!(
            "Scanning {} list pages ({}..={}) with {} workers",
            total,
            pages.start(),
            pages.end(),
            pool.size()
        );

        let pages: Vec<u32> = pages.collect();
        let crawler = Arc::clone(self);
        let mut run = pool
            .run(pages, cancel, move |page| {
                let crawler = Arc::clone(&crawler);
                async move { crawler.scan_list_page(page).await }
            })
            .await;

        if let Some(err) = run.take_structural_error() {
            tracing::error!("Catalog run aborted: {}", err);
            return Err(err);
        }

        let mut summary = CatalogRunSummary {
            cancelled: run.cancelled,
            ..CatalogRunSummary::default()
        };
        for (page, result) in &run.results {
            match result {
                Ok(outcome) => summary.absorb(outcome),
                Err(e) => {
                    // Anything left here escaped both the ledger and the structural path.
                    tracing::error!("Page {} failed unexpectedly: {}", page, e);
                    summary.pages_attempted += 1;
                    summary.pages_failed += 1;
                }
            }
        }
        summary.pages_failed += run.panicked;

        if run.cancelled {
            tracing::warn!(
                "Catalog run cancelled, {} pages not dispatched",
                run.undispatched
            );
        }

        Ok(summary)
    }
}

/// Replays a ledgered page id
///
/// Goes through [`CatalogCrawler::try_scan_page`], so a page that fails again
/// is reported to the retry pass instead of being ledgered a second time.
#[async_trait]
impl RetryOperation for CatalogCrawler {
    async fn attempt(&self, id: &str) -> Result<(), HarvestError> {
        let page: u32 = id
            .parse()
            .map_err(|_| HarvestError::InvalidId(format!("not a page number: {}", id)))?;
        self.try_scan_page(page).await.map(|_| ())
    }
}
