use serde::Deserialize;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Size of the worker pool; at most this many fetches are in flight
    #[serde(rename = "max-concurrent-fetches", default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: u32,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_max_concurrent_fetches() -> u32 {
    8
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Where list and detail pages live
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// List page URL with a `{page}` placeholder, e.g. `https://host/list/{page}.html`
    #[serde(rename = "list-url-template")]
    pub list_url_template: String,

    /// Detail page URL with an `{id}` placeholder
    #[serde(rename = "detail-url-template")]
    pub detail_url_template: String,

    /// Query parameter of the detail link that carries the record id
    #[serde(rename = "id-query-param", default = "default_id_query_param")]
    pub id_query_param: String,
}

fn default_id_query_param() -> String {
    "ID".to_string()
}

/// Positional extraction contract with the remote page layout.
///
/// Indexes are zero-based positions among all matching elements of the
/// document, in document order. They are fixed by the operator, never
/// inferred.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    /// Which `<table>` on a list page holds the catalog rows
    #[serde(rename = "list-table-index", default = "default_list_table_index")]
    pub list_table_index: usize,

    /// Cell positions of standard name, city, county, short name, alias, used name
    #[serde(rename = "list-summary-columns", default = "default_list_summary_columns")]
    pub list_summary_columns: [usize; 6],

    /// Cell holding the `<a href>` to the detail page
    #[serde(rename = "list-link-column", default = "default_list_link_column")]
    pub list_link_column: usize,

    /// Which `<tbody>` on a detail page holds the fields
    #[serde(rename = "detail-tbody-index", default = "default_detail_tbody_index")]
    pub detail_tbody_index: usize,

    /// Cell within each detail row that carries the value
    #[serde(rename = "detail-value-column", default = "default_detail_value_column")]
    pub detail_value_column: usize,

    #[serde(rename = "detail-rows", default)]
    pub detail_rows: DetailRows,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            list_table_index: default_list_table_index(),
            list_summary_columns: default_list_summary_columns(),
            list_link_column: default_list_link_column(),
            detail_tbody_index: default_detail_tbody_index(),
            detail_value_column: default_detail_value_column(),
            detail_rows: DetailRows::default(),
        }
    }
}

fn default_list_table_index() -> usize {
    21
}

fn default_list_summary_columns() -> [usize; 6] {
    [0, 1, 2, 3, 4, 5]
}

fn default_list_link_column() -> usize {
    6
}

fn default_detail_tbody_index() -> usize {
    21
}

fn default_detail_value_column() -> usize {
    1
}

/// Row offsets of each detail field inside the detail `<tbody>`
#[derive(Debug, Clone, Deserialize)]
pub struct DetailRows {
    pub rome: usize,
    #[serde(rename = "use-time")]
    pub use_time: usize,
    #[serde(rename = "full-name")]
    pub full_name: usize,
    pub origin: usize,
    pub describe: usize,
    pub remark: usize,
}

impl Default for DetailRows {
    fn default() -> Self {
        Self {
            rome: 1,
            use_time: 2,
            full_name: 4,
            origin: 5,
            describe: 6,
            remark: 7,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Failure ledger of the catalog stage (page ids)
    #[serde(rename = "catalog-ledger-path", default = "default_catalog_ledger_path")]
    pub catalog_ledger_path: String,

    /// Failure ledger of the detail stage (record ids)
    #[serde(rename = "detail-ledger-path", default = "default_detail_ledger_path")]
    pub detail_ledger_path: String,
}

fn default_catalog_ledger_path() -> String {
    "failed_scrapes.txt".to_string()
}

fn default_detail_ledger_path() -> String {
    "failed_scrape_details.txt".to_string()
}
