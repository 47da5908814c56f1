//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to serve list and detail pages and drive the
//! catalog stage, the gap, the detail stage and ledger replay end-to-end.

use catalog_harvest::config::{
    Config, CrawlerConfig, LayoutConfig, OutputConfig, SourceConfig, UserAgentConfig,
};
use catalog_harvest::crawler::{CrawlStage, Harvester, HttpFetcher};
use catalog_harvest::storage::{RunStatus, SqliteStorage, Stage, Storage};
use catalog_harvest::RetryOutcome;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_concurrent_fetches: 4,
            request_timeout_secs: 5,
            connect_timeout_secs: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        source: SourceConfig {
            list_url_template: format!("{}/list/{{page}}.html", base_url),
            detail_url_template: format!("{}/detail.aspx?ID={{id}}", base_url),
            id_query_param: "ID".to_string(),
        },
        layout: LayoutConfig {
            list_table_index: 1,
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

/// List page with a navigation table first and the data table second
fn list_html(rows: &[(&str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(name, href)| {
            format!(
                "<tr><td>{}</td><td>City</td><td>County</td><td>Short</td><td>Alias</td><td>Used</td><td><a href=\"{}\">detail</a></td></tr>",
                name, href
            )
        })
        .collect();
    format!(
        "<html><body><table><tr><td>nav</td></tr></table>\
         <table><tr><th>Name</th></tr>{}</table></body></html>",
        rows
    )
}

fn detail_html(rome: &str) -> String {
    format!(
        "<html><body><table><tbody>\
         <tr><td>Name</td><td>x</td></tr>\
         <tr><td>Rome</td><td>{}</td></tr>\
         <tr><td>Use time</td><td>1912</td></tr>\
         <tr><td>Code</td><td>-</td></tr>\
         <tr><td>Full name</td><td>Full</td></tr>\
         <tr><td>Origin</td><td>Origin</td></tr>\
         <tr><td>Describe</td><td>Describe</td></tr>\
         <tr><td>Remark</td><td>Remark</td></tr>\
         </tbody></table></body></html>",
        rome
    )
}

async fn mount_list(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/list/{}.html", page)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: &str, rome: &str) {
    Mock::given(method("GET"))
        .and(path("/detail.aspx"))
        .and(query_param("ID", id))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_html(rome)))
        .mount(server)
        .await;
}

/// Answers `status` for the first request only
async fn mount_failure_once(server: &MockServer, url_path: &str, id: Option<&str>, status: u16) {
    let mut mock = Mock::given(method("GET")).and(path(url_path));
    if let Some(id) = id {
        mock = mock.and(query_param("ID", id));
    }
    mock.respond_with(ResponseTemplate::new(status))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

fn build_harvester(config: Config) -> (Arc<SqliteStorage>, Harvester) {
    let storage = Arc::new(SqliteStorage::new(Path::new(&config.output.database_path)).unwrap());
    let fetcher = HttpFetcher::from_config(&config.user_agent, &config.crawler).unwrap();
    let harvester = Harvester::new(config, storage.clone(), Arc::new(fetcher));
    (storage, harvester)
}

#[tokio::test]
async fn test_full_pipeline_with_retries() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_list(
        &server,
        1,
        list_html(&[
            ("Alpha", "/detail.aspx?ID=1"),
            ("Beta", "detail.aspx?ID=2"),
            ("Broken", "/detail.aspx?page=9"),
        ]),
    )
    .await;
    mount_failure_once(&server, "/list/2.html", None, 502).await;
    mount_list(&server, 2, list_html(&[("Gamma", "/detail.aspx?ID=3")])).await;

    mount_detail(&server, "1", "One").await;
    mount_failure_once(&server, "/detail.aspx", Some("2"), 500).await;
    mount_detail(&server, "2", "Two").await;
    mount_detail(&server, "3", "Three").await;

    let (storage, harvester) = build_harvester(config);
    let cancel = CancellationToken::new();

    // Catalog stage: page 2 fails once and is ledgered
    let catalog = harvester.crawl_catalog(1..=2, &cancel).await.unwrap();
    assert_eq!(catalog.pages_attempted, 2);
    assert_eq!(catalog.pages_failed, 1);
    assert_eq!(catalog.records_inserted, 2);
    assert_eq!(catalog.rows_without_id, 1);
    let catalog_ledger = Arc::clone(harvester.ledger(CrawlStage::Catalog));
    assert_eq!(catalog_ledger.read_ids().unwrap(), vec!["2"]);

    // Replaying the catalog ledger picks up page 2
    let report = harvester
        .retry_stage(CrawlStage::Catalog, None, false, &cancel)
        .await
        .unwrap();
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].outcome, RetryOutcome::Succeeded);
    assert_eq!(storage.count_catalog().unwrap(), 3);

    // Detail stage: id 2 fails once
    let mut pending: Vec<String> = harvester.pending_ids().unwrap().into_iter().collect();
    pending.sort();
    assert_eq!(pending, vec!["1", "2", "3"]);

    let detail = harvester.enrich_pending(&cancel).await.unwrap();
    assert_eq!(detail.attempted, 3);
    assert_eq!(detail.inserted, 2);
    assert_eq!(detail.failed, 1);
    let detail_ledger = Arc::clone(harvester.ledger(CrawlStage::Detail));
    assert_eq!(detail_ledger.read_ids().unwrap(), vec!["2"]);
    assert_eq!(
        harvester.pending_ids().unwrap().into_iter().collect::<Vec<_>>(),
        vec!["2"]
    );

    let report = harvester
        .retry_stage(CrawlStage::Detail, None, false, &cancel)
        .await
        .unwrap();
    assert_eq!(report.succeeded(), 1);
    assert!(harvester.pending_ids().unwrap().is_empty());
    assert_eq!(storage.find_detail("2").unwrap().unwrap().rome, "Two");
    assert_eq!(storage.find_detail("1").unwrap().unwrap().use_time, "1912");

    // Every stage invocation left a closed run behind
    for stage in Stage::ALL {
        let run = storage.latest_run(stage).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }
}

#[tokio::test]
async fn test_catalog_rerun_is_idempotent() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_list(
        &server,
        1,
        list_html(&[("Alpha", "/detail.aspx?ID=10"), ("Beta", "/detail.aspx?ID=11")]),
    )
    .await;

    let (storage, harvester) = build_harvester(config);
    let cancel = CancellationToken::new();

    let first = harvester.crawl_catalog(1..=1, &cancel).await.unwrap();
    let ids_after_first = storage.catalog_ids().unwrap();
    let second = harvester.crawl_catalog(1..=1, &cancel).await.unwrap();

    assert_eq!(first.records_inserted, 2);
    assert_eq!(second.records_inserted, 0);
    assert_eq!(second.rows_already_present, 2);
    assert_eq!(storage.catalog_ids().unwrap(), ids_after_first);
    assert_eq!(
        storage.find_catalog("10").unwrap().unwrap().standard_name,
        "Alpha"
    );
}

#[tokio::test]
async fn test_failed_detail_retry_is_reported_not_relogged() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_list(&server, 1, list_html(&[("Alpha", "/detail.aspx?ID=5")])).await;
    Mock::given(method("GET"))
        .and(path("/detail.aspx"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (storage, harvester) = build_harvester(config);
    let cancel = CancellationToken::new();

    harvester.crawl_catalog(1..=1, &cancel).await.unwrap();
    let detail = harvester.enrich_pending(&cancel).await.unwrap();
    assert_eq!(detail.failed, 1);

    let report = harvester
        .retry_stage(CrawlStage::Detail, None, false, &cancel)
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    assert!(matches!(report.entries[0].outcome, RetryOutcome::Failed(_)));
    assert_eq!(
        harvester.ledger(CrawlStage::Detail).read_ids().unwrap(),
        vec!["5"]
    );
    assert_eq!(storage.count_details().unwrap(), 0);
}
