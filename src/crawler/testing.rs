//! In-memory fetcher for unit tests

use crate::crawler::DocumentFetcher;
use crate::FetchError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves scripted responses per URL and counts requests
///
/// Each URL has a queue of responses; the last one repeats forever.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct StaticFetcher {
    responses: Mutex<HashMap<String, Vec<Result<String, FetchError>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, body: impl Into<String>) -> Self {
        self.script(url, vec![Ok(body.into())])
    }

    pub fn failing(self, url: &str, status: u16) -> Self {
        self.script(url, vec![Err(status_error(url, status))])
    }

    pub fn script(self, url: &str, responses: Vec<Result<String, FetchError>>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), responses);
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

pub fn status_error(url: &str, status: u16) -> FetchError {
    FetchError::Status {
        url: url.to_string(),
        status,
    }
}

#[async_trait]
impl DocumentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Err(status_error(url, 404)),
        }
    }
}

/// A list page whose row table is the first `<table>`
pub fn list_page(rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(name, href)| {
            format!(
                "<tr><td>{}</td><td>City</td><td>County</td><td>S</td><td>A</td><td>U</td><td><a href=\"{}\">more</a></td></tr>",
                name, href
            )
        })
        .collect();
    format!("<html><body><table>{}</table></body></html>", body)
}

/// A detail page whose field tbody is the first `<tbody>`
pub fn detail_page(rome: &str) -> String {
    format!(
        "<html><body><table><tbody>\
         <tr><td>h</td><td>h</td></tr>\
         <tr><td>rome</td><td>{}</td></tr>\
         <tr><td>use</td><td>1950</td></tr>\
         <tr><td>-</td><td>-</td></tr>\
         <tr><td>full</td><td>Full</td></tr>\
         <tr><td>origin</td><td>Origin</td></tr>\
         <tr><td>describe</td><td>Describe</td></tr>\
         <tr><td>remark</td><td>Remark</td></tr>\
         </tbody></table></body></html>",
        rome
    )
}

pub const LIST_TEMPLATE: &str = "https://example.com/list/{page}.html";
pub const DETAIL_TEMPLATE: &str = "https://example.com/detail?ID={id}";

pub fn list_url(page: u32) -> String {
    crate::links::list_page_url(LIST_TEMPLATE, page)
}

pub fn detail_url(id: &str) -> String {
    crate::links::detail_page_url(DETAIL_TEMPLATE, id)
}

/// Config matching the helpers above, with ledgers under `dir`
pub fn test_config(dir: &std::path::Path) -> crate::Config {
    use crate::config::{
        Config, CrawlerConfig, LayoutConfig, OutputConfig, SourceConfig, UserAgentConfig,
    };

    Config {
        crawler: CrawlerConfig {
            max_concurrent_fetches: 4,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        },
        source: SourceConfig {
            list_url_template: LIST_TEMPLATE.to_string(),
            detail_url_template: DETAIL_TEMPLATE.to_string(),
            id_query_param: "ID".to_string(),
        },
        layout: LayoutConfig {
            list_table_index: 0,
            detail_tbody_index: 0,
            ..LayoutConfig::default()
        },
        output: OutputConfig {
            database_path: dir.join("harvest.db").display().to_string(),
            catalog_ledger_path: dir.join("failed_scrapes.txt").display().to_string(),
            detail_ledger_path: dir.join("failed_scrape_details.txt").display().to_string(),
        },
    }
}
