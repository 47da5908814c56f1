//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the two-stage catalog harvester.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::crawler::{CrawlStage, Harvester, HttpFetcher};
use catalog_harvest::output::{load_statistics, print_statistics};
use catalog_harvest::storage::open_storage;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: an incremental two-stage catalog harvester
///
/// Discovers records from paginated list pages, enriches them from their
/// detail pages, and replays failed pages or ids from per-stage ledgers.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An incremental two-stage catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl list pages and record newly discovered catalog entries
    Catalog {
        /// First list page to scan
        #[arg(long)]
        start: u32,

        /// Last list page to scan (inclusive)
        #[arg(long)]
        end: u32,
    },

    /// Fetch detail pages for every catalog entry that has none yet
    Detail,

    /// Replay a failure ledger through its stage
    Retry {
        /// Which stage's operation to replay through
        #[arg(value_enum)]
        stage: StageArg,

        /// Read this ledger instead of the configured one
        #[arg(long, value_name = "PATH")]
        ledger: Option<PathBuf>,

        /// Append entries that fail again to the stage ledger
        #[arg(long)]
        relog: bool,
    },

    /// Show how many catalog entries still lack details
    Pending {
        /// Print the pending ids as well
        #[arg(long)]
        list: bool,
    },

    /// Show statistics from the database and ledgers
    Stats,

    /// Validate the config and show the resolved layout without crawling
    Check,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StageArg {
    Catalog,
    Detail,
}

impl From<StageArg> for CrawlStage {
    fn from(stage: StageArg) -> Self {
        match stage {
            StageArg::Catalog => CrawlStage::Catalog,
            StageArg::Detail => CrawlStage::Detail,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Check => handle_check(&config),
        Command::Stats => handle_stats(&config),
        Command::Pending { list } => handle_pending(config, config_hash, list),
        Command::Catalog { start, end } => handle_catalog(config, config_hash, start, end).await,
        Command::Detail => handle_detail(config, config_hash).await,
        Command::Retry {
            stage,
            ledger,
            relog,
        } => handle_retry(config, config_hash, stage.into(), ledger, relog).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Opens the store and builds a harvester over the live HTTP fetcher
fn build_harvester(config: Config, config_hash: String) -> anyhow::Result<Harvester> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;
    let fetcher = HttpFetcher::from_config(&config.user_agent, &config.crawler)
        .context("Failed to build HTTP client")?;

    Ok(Harvester::new(config, Arc::new(storage), Arc::new(fetcher)).with_config_hash(config_hash))
}

/// Cancels the returned token on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            token.cancel();
        }
    });
    cancel
}

/// Handles the `catalog` command
async fn handle_catalog(
    config: Config,
    config_hash: String,
    start: u32,
    end: u32,
) -> anyhow::Result<()> {
    anyhow::ensure!(start <= end, "--start {} is after --end {}", start, end);

    let harvester = build_harvester(config, config_hash)?;
    let cancel = cancel_on_ctrl_c();
    let summary = harvester
        .crawl_catalog(start..=end, &cancel)
        .await
        .context("Catalog run aborted")?;

    println!("=== Catalog Run ===\n");
    println!("  Pages attempted: {}", summary.pages_attempted);
    println!("  Pages failed: {}", summary.pages_failed);
    println!("  Rows seen: {}", summary.rows_seen);
    println!("  New records: {}", summary.records_inserted);
    println!(
        "  Already present: {}",
        summary.rows_already_present + summary.duplicate_races
    );
    println!("  Rows without id: {}", summary.rows_without_id);
    if summary.pages_failed > 0 {
        println!(
            "\nFailed pages were logged to {}",
            harvester.ledger(CrawlStage::Catalog).path().display()
        );
    }
    if summary.cancelled {
        println!("\nRun was cancelled before all pages were scanned");
    }

    Ok(())
}

/// Handles the `detail` command
async fn handle_detail(config: Config, config_hash: String) -> anyhow::Result<()> {
    let harvester = build_harvester(config, config_hash)?;
    let cancel = cancel_on_ctrl_c();
    let summary = harvester
        .enrich_pending(&cancel)
        .await
        .context("Detail run aborted")?;

    println!("=== Detail Run ===\n");
    println!("  Ids attempted: {}", summary.attempted);
    println!("  Enriched: {}", summary.inserted);
    println!("  Already present: {}", summary.already_present);
    println!("  Failed: {}", summary.failed);
    if summary.failed > 0 {
        println!(
            "\nFailed ids were logged to {}",
            harvester.ledger(CrawlStage::Detail).path().display()
        );
    }
    if summary.cancelled {
        println!("\nRun was cancelled before all ids were enriched");
    }

    Ok(())
}

/// Handles the `retry` command
async fn handle_retry(
    config: Config,
    config_hash: String,
    stage: CrawlStage,
    ledger: Option<PathBuf>,
    relog: bool,
) -> anyhow::Result<()> {
    let harvester = build_harvester(config, config_hash)?;
    let cancel = cancel_on_ctrl_c();
    let report = harvester
        .retry_stage(stage, ledger.as_deref(), relog, &cancel)
        .await
        .with_context(|| format!("Retry of {} ledger aborted", stage))?;

    println!("=== Retry ({}) ===\n", stage);
    for entry in &report.entries {
        match &entry.outcome {
            catalog_harvest::RetryOutcome::Succeeded => println!("  {}: ok", entry.id),
            catalog_harvest::RetryOutcome::Failed(message) => {
                println!("  {}: failed ({})", entry.id, message)
            }
        }
    }
    println!(
        "\n  Succeeded: {}, Failed: {}",
        report.succeeded(),
        report.failed()
    );
    if report.cancelled {
        println!("\nRetry was cancelled before all ids were attempted");
    }

    Ok(())
}

/// Handles the `pending` command
fn handle_pending(config: Config, config_hash: String, list: bool) -> anyhow::Result<()> {
    let harvester = build_harvester(config, config_hash)?;
    let mut pending: Vec<String> = harvester.pending_ids()?.into_iter().collect();
    pending.sort();

    println!("Pending enrichment: {}", pending.len());
    if list {
        for id in &pending {
            println!("  {}", id);
        }
    }

    Ok(())
}

/// Handles the `stats` command
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;
    let stats = load_statistics(&storage, config)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the `check` command: config is already validated, show what it resolves to
fn handle_check(config: &Config) -> anyhow::Result<()> {
    println!("=== Catalog-Harvest Check ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Connect timeout: {}s", config.crawler.connect_timeout_secs);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nSource:");
    println!("  List pages: {}", config.source.list_url_template);
    println!("  Detail pages: {}", config.source.detail_url_template);
    println!("  Id parameter: {}", config.source.id_query_param);

    let layout = &config.layout;
    let rows = &layout.detail_rows;
    println!("\nLayout:");
    println!("  List table index: {}", layout.list_table_index);
    println!("  List summary columns: {:?}", layout.list_summary_columns);
    println!("  List link column: {}", layout.list_link_column);
    println!("  Detail tbody index: {}", layout.detail_tbody_index);
    println!("  Detail value column: {}", layout.detail_value_column);
    println!(
        "  Detail rows: rome={} use-time={} full-name={} origin={} describe={} remark={}",
        rows.rome, rows.use_time, rows.full_name, rows.origin, rows.describe, rows.remark
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Catalog ledger: {}", config.output.catalog_ledger_path);
    println!("  Detail ledger: {}", config.output.detail_ledger_path);

    println!("\n✓ Configuration is valid");

    Ok(())
}
