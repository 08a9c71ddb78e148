//! Catalog Snapshot main entry point
//!
//! This is the command-line interface for the catalog ingester.

use anyhow::{bail, Context};
use catalog_snapshot::catalog::CatalogAddress;
use catalog_snapshot::config::{load_config_with_hash, Config, MAX_TOTAL_PAGES};
use catalog_snapshot::crawler::CrawlService;
use catalog_snapshot::output::{
    generate_markdown_summary, load_statistics, print_session, print_statistics, CatalogSummary,
};
use catalog_snapshot::storage::{open_storage, SnapshotStore};
use catalog_snapshot::Book;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Catalog Snapshot: a polite book catalog ingester
///
/// Crawls a paginated book catalog, validates every listed book and replaces
/// the stored snapshot in one atomic step. Stats and lookups read the stored
/// snapshot without touching the network.
#[derive(Parser, Debug)]
#[command(name = "catalog-snapshot")]
#[command(version)]
#[command(about = "A polite book catalog ingester", long_about = None)]
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

    /// Crawl this many pages instead of the configured total
    #[arg(
        long,
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TOTAL_PAGES))
    )]
    pages: Option<u32>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "find"])]
    dry_run: bool,

    /// Show statistics for the stored snapshot and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary", "find"])]
    stats: bool,

    /// Write the markdown summary for the stored snapshot and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "find"])]
    export_summary: bool,

    /// Print one stored book, by id or detail URL, and exit
    #[arg(long, value_name = "ID")]
    find: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let pages = cli.pages.unwrap_or(config.catalog.total_pages);

    if cli.dry_run {
        handle_dry_run(&config, pages)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.export_summary {
        handle_export_summary(&config)
    } else if let Some(id) = cli.find.as_deref() {
        handle_find(&config, id)
    } else {
        handle_crawl(config, config_hash, pages).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_snapshot=info,warn"),
            1 => EnvFilter::new("catalog_snapshot=debug,info"),
            2 => EnvFilter::new("catalog_snapshot=trace,debug"),
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

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn SnapshotStore>> {
    let store = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("failed to open {}", config.output.database_path))?;
    Ok(Arc::new(store))
}

/// Handles the --dry-run mode: shows the crawl plan without any network access
fn handle_dry_run(config: &Config, pages: u32) -> anyhow::Result<()> {
    let address = CatalogAddress::from_config(&config.catalog)?;

    println!("=== Catalog Snapshot Dry Run ===\n");

    println!("Catalog:");
    println!("  Base URL: {}", address.base());
    println!("  Pages: {}", pages);
    for page in 1..=pages.min(3) {
        println!("    {:>5}: {}", page, address.page_url(page)?);
    }
    if pages > 4 {
        println!("    {:>5}  ...", "");
    }
    if pages > 3 {
        println!("    {:>5}: {}", pages, address.page_url(pages)?);
    }

    println!("\nCrawler:");
    println!(
        "  Politeness delay: {}ms (raised by robots.txt Crawl-delay if larger)",
        config.crawler.politeness_delay_ms
    );
    println!(
        "  Crawl-delay cap: {}s",
        config.crawler.max_crawl_delay_secs
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!(
        "  Respect robots.txt: {}",
        if config.crawler.respect_robots { "yes" } else { "no" }
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics for the stored snapshot
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(config)?;
    match store.current_snapshot()? {
        Some(info) => println!(
            "Snapshot {} ({} books, created {})\n",
            info.id,
            info.book_count,
            info.created_at.to_rfc3339()
        ),
        None => println!("No snapshot stored yet\n"),
    }

    let stats = load_statistics(store.as_ref())?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: writes the markdown summary
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Catalog Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let store = open_store(config)?;
    let summary = CatalogSummary::load(store.as_ref(), None)?;
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the --find mode: prints one stored book
fn handle_find(config: &Config, key: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;

    let book = if key.starts_with("http://") || key.starts_with("https://") {
        store.find_by_detail_url(key)?
    } else {
        store.find_by_id(key)?
    };

    match book {
        Some(book) => {
            print_book(&book);
            Ok(())
        }
        None => bail!("no book with id or detail URL {}", key),
    }
}

fn print_book(book: &Book) {
    println!("{}", book.title);
    println!("  Id: {}", book.id);
    println!("  Price: {} ({})", book.formatted_price(), book.price_text);
    println!(
        "  Rating: {} ({}/5){}",
        book.rating_text(),
        book.rating_value(),
        if book.is_highly_rated() { " *" } else { "" }
    );
    println!("  Availability: {}", book.availability_text);
    println!("  Detail: {}", book.detail_url);
    println!("  Image: {}", book.image_url);
    println!("  Scraped: {}", book.scraped_at.to_rfc3339());
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, pages: u32) -> anyhow::Result<()> {
    let summary_path = PathBuf::from(&config.output.summary_path);
    let store = open_store(&config)?;
    let service = CrawlService::new(config, Arc::clone(&store), config_hash);

    // Ctrl-C stops the run before its next page; nothing is stored
    let abort = service.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, aborting crawl before the next page");
            abort.abort();
        }
    });

    let session = match service.crawl_pages(pages).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    print_session(&session);

    let summary = CatalogSummary::load(store.as_ref(), Some(session.clone()))?;
    print_statistics(&summary.stats);
    generate_markdown_summary(&summary, &summary_path)?;
    tracing::info!("Summary written to {}", summary_path.display());

    session.ensure_replaced()?;
    Ok(())
}
