//! Crawler module for the two harvest stages
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching behind the `DocumentFetcher` seam
//! - Positional parsing of list and detail pages
//! - The bounded worker pool
//! - The catalog and detail crawlers, the gap computation and orchestration

mod catalog;
mod detail;
mod fetcher;
mod gap;
mod harvester;
mod parser;
mod pool;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{CatalogCrawler, CatalogRunSummary, PageOutcome, PageScan, RowOutcome};
pub use detail::{DetailCrawler, DetailRunSummary, EnrichOutcome};
pub use fetcher::{build_http_client, DocumentFetcher, HttpFetcher};
pub use gap::pending_detail_ids;
pub use harvester::{CrawlStage, Harvester};
pub use parser::{parse_detail_page, parse_list_page, ParsedListPage};
pub use pool::{PoolRun, WorkPool};
