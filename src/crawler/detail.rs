//! Detail stage: one detail page per pending id
//!
//! An id that already has a detail record is finished and is never fetched
//! again, which makes enrichment safe to repeat through retries or re-runs.

use crate::config::{Config, LayoutConfig, SourceConfig};
use crate::crawler::parser::parse_detail_page;
use crate::crawler::pool::WorkPool;
use crate::crawler::DocumentFetcher;
use crate::ledger::FailureLedger;
use crate::links::{detail_page_url, is_record_id};
use crate::retry::RetryOperation;
use crate::storage::Storage;
use crate::HarvestError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    Inserted,
    /// A detail record already existed; nothing was fetched or written
    AlreadyPresent,
    /// Fetch or parse failed; the id is in the detail ledger
    Failed(String),
}

/// Totals for an enrichment run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailRunSummary {
    pub attempted: usize,
    pub inserted: usize,
    pub already_present: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl DetailRunSummary {
    fn absorb(&mut self, outcome: &EnrichOutcome) {
        self.attempted += 1;
        match outcome {
            EnrichOutcome::Inserted => self.inserted += 1,
            EnrichOutcome::AlreadyPresent => self.already_present += 1,
            EnrichOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Fetches detail pages and fills the detail collection
pub struct DetailCrawler {
    fetcher: Arc<dyn DocumentFetcher>,
    storage: Arc<dyn Storage>,
    ledger: Arc<FailureLedger>,
    source: SourceConfig,
    layout: LayoutConfig,
    run_id: Option<i64>,
}

impl DetailCrawler {
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

    /// Enriches one id without touching the ledger
    ///
    /// Only ids present in the catalog are enriched; anything else, such as a
    /// stale or foreign ledger entry, fails with `InvalidId` before a fetch.
    pub async fn try_enrich(&self, id: &str) -> Result<EnrichOutcome, HarvestError> {
        if !is_record_id(id) {
            return Err(HarvestError::InvalidId(format!("malformed record id {:?}", id)));
        }

        if self.storage.find_detail(id)?.is_some() {
            tracing::debug!("Detail for {} already stored, skipping", id);
            return Ok(EnrichOutcome::AlreadyPresent);
        }

        if self.storage.find_catalog(id)?.is_none() {
            return Err(HarvestError::InvalidId(format!("{} is not in the catalog", id)));
        }

        let url = detail_page_url(&self.source.detail_url_template, id);
        let body = self.fetcher.fetch(&url).await?;
        let record = parse_detail_page(&body, &url, id, &self.layout)?;

        match self.storage.insert_detail(&record, self.run_id) {
            Ok(()) => Ok(EnrichOutcome::Inserted),
            Err(e) => match HarvestError::from(e) {
                HarvestError::DuplicateKey { .. } => {
                    tracing::warn!("Detail for {} was inserted concurrently, skipping", id);
                    Ok(EnrichOutcome::AlreadyPresent)
                }
                other => Err(other),
            },
        }
    }

    /// Enriches one id, ledgering fetch and parse failures
    ///
    /// Only structural errors are returned as `Err`, so a caller looping over
    /// ids keeps going past individual failures.
    pub async fn enrich_one(&self, id: &str) -> Result<EnrichOutcome, HarvestError> {
        match self.try_enrich(id).await {
            Err(e) if e.is_item_failure() => {
                tracing::warn!("Error scraping details for id {}: {}", id, e);
                self.ledger.record(id.to_string(), e.to_string()).await?;
                Ok(EnrichOutcome::Failed(e.to_string()))
            }
            other => other,
        }
    }

    /// Enriches every id through the pool
    pub async fn enrich_all(
        self: &Arc<Self>,
        ids: Vec<String>,
        pool: &WorkPool,
        cancel: &CancellationToken,
    ) -> Result<DetailRunSummary, HarvestError> {
        tracing::info!(
            "Enriching {} pending ids with {} workers",
            ids.len(),
            pool.size()
        );

        let crawler = Arc::clone(self);
        let mut run = pool
            .run(ids, cancel, move |id| {
                let crawler = Arc::clone(&crawler);
                async move { crawler.enrich_one(&id).await }
            })
            .await;

        if let Some(err) = run.take_structural_error() {
            tracing::error!("Detail run aborted: {}", err);
            return Err(err);
        }

        let mut summary = DetailRunSummary {
            cancelled: run.cancelled,
            ..DetailRunSummary::default()
        };
        for (id, result) in &run.results {
            match result {
                Ok(outcome) => summary.absorb(outcome),
                Err(e) => {
                    tracing::error!("Id {} failed unexpectedly: {}", id, e);
                    summary.attempted += 1;
                    summary.failed += 1;
                }
            }
        }
        summary.failed += run.panicked;

        if run.cancelled {
            tracing::warn!(
                "Detail run cancelled, {} ids not dispatched",
                run.undispatched
            );
        }

        Ok(summary)
    }
}

/// Replays a ledgered record id without ledgering it again
#[async_trait]
impl RetryOperation for DetailCrawler {
    async fn attempt(&self, id: &str) -> Result<(), HarvestError> {
        self.try_enrich(id).await.map(|_| ())
    }
}
