//! Catalog-Harvest: an incremental two-stage catalog harvester
//!
//! This crate walks paginated list pages to discover catalog records, works out
//! which of them still lack a detail record, enriches those from their detail
//! pages, and keeps per-stage failure ledgers so failed items can be replayed
//! without re-running the whole crawl.

pub mod config;
pub mod crawler;
pub mod ledger;
pub mod links;
pub mod output;
pub mod records;
pub mod retry;
pub mod storage;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Duplicate {collection} record: {id}")]
    DuplicateKey { collection: String, id: String },

    #[error("Storage error: {0}")]
    Store(storage::StorageError),

    #[error("Ledger error: {0}")]
    LedgerIo(#[from] ledger::LedgerError),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}

impl From<storage::StorageError> for HarvestError {
    fn from(err: storage::StorageError) -> Self {
        match err {
            storage::StorageError::DuplicateKey { collection, id } => {
                HarvestError::DuplicateKey { collection, id }
            }
            other => HarvestError::Store(other),
        }
    }
}

impl HarvestError {
    /// Returns true if continuing the run would silently drop work
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Store(_) | Self::LedgerIo(_))
    }

    /// Returns true if this error belongs to a single page or id
    pub fn is_item_failure(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Parse(_) | Self::InvalidId(_))
    }
}

/// Document fetch failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

/// Document shape mismatches
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No <{tag}> at index {index} in {url}")]
    MissingElement {
        url: String,
        tag: &'static str,
        index: usize,
    },

    #[error("Invalid selector '{0}'")]
    Selector(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CatalogCrawler, DetailCrawler, Harvester};
pub use ledger::FailureLedger;
pub use records::{CatalogRecord, DetailRecord};
pub use retry::{retry, RetryOutcome, RetryReport};
pub use storage::{SqliteStorage, Storage};
