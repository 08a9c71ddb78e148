//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that drives one run end to end:
//! - Reading the catalog's robots.txt and settling the request interval
//! - Fetching pages through the shared rate limiter, at most N at a time
//! - Extracting and validating each page's records in catalog order
//! - Handing the finished batch to the store in one atomic replace
//!
//! `CrawlService` sits on top and makes sure two runs never overlap.

use crate::book::{Book, RecordValidator};
use crate::catalog::CatalogAddress;
use crate::config::Config;
use crate::crawler::extractor::{ItemSelectors, RecordExtractor};
use crate::crawler::scheduler::{effective_delay, RateLimiter};
use crate::crawler::{build_http_client, FetchError, PageFetcher, RawPageDocument};
use crate::robots::{load_robots, ParsedRobots};
use crate::state::{CrawlOutcome, CrawlPhase, CrawlSession};
use crate::storage::{SnapshotInfo, SnapshotStore, SqliteStorage, StorageResult};
use crate::CatalogError;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

type FetchTask = JoinHandle<Result<RawPageDocument, FetchError>>;

/// Requests that a running crawl stop before its next page
///
/// Clones share one flag. An aborted run stores nothing.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    requested: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to stop before the next page
    pub fn abort(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// Result of a finished run: the batch it built and its session summary
#[derive(Debug)]
pub struct CrawlReport {
    /// Accepted books in catalog order
    pub books: Vec<Book>,
    pub session: CrawlSession,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    store: Arc<dyn SnapshotStore>,
    fetcher: PageFetcher,
    extractor: RecordExtractor,
    validator: RecordValidator,
    config_hash: String,
    abort: AbortHandle,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration
    /// * `store` - Where the finished batch is written
    /// * `config_hash` - Recorded with the snapshot the run produces
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CatalogError)` - Bad base URL or HTTP client setup failure
    pub fn new(
        config: Config,
        store: Arc<dyn SnapshotStore>,
        config_hash: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let address = CatalogAddress::from_config(&config.catalog)?;
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;

        Ok(Self {
            fetcher: PageFetcher::new(client, address.clone()),
            extractor: RecordExtractor::new(&ItemSelectors::default())?,
            validator: RecordValidator::new(address),
            config: Arc::new(config),
            store,
            config_hash: config_hash.into(),
            abort: AbortHandle::new(),
        })
    }

    /// Uses `abort` instead of the coordinator's own handle
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Crawls pages `1..=total_pages` and replaces the stored snapshot
    ///
    /// Page failures are counted and skipped. The run ends in one of three
    /// outcomes (completed, degraded, store failed), all reported through
    /// `Ok`; only the first replaces the snapshot.
    ///
    /// # Errors
    ///
    /// `CatalogError::Aborted` when the abort handle fires; nothing is
    /// written in that case.
    pub async fn run(&self, total_pages: u32) -> Result<CrawlReport, CatalogError> {
        let mut session = CrawlSession::new(total_pages);
        tracing::info!(
            "Starting crawl of {} pages from {}",
            total_pages,
            self.fetcher.address().base()
        );

        let agent = self.config.user_agent.crawler_name.clone();
        let configured = Duration::from_millis(self.config.crawler.politeness_delay_ms);
        let max_robots_delay = Duration::from_secs(self.config.crawler.max_crawl_delay_secs);

        // The robots.txt request is the run's first request to the catalog;
        // page 1 is spaced from it like any other request.
        let (robots, limiter) = if self.config.crawler.respect_robots {
            let requested_at = Instant::now();
            let robots = load_robots(&self.fetcher).await;
            let interval = effective_delay(configured, robots.crawl_delay(&agent), max_robots_delay);
            if interval > configured {
                tracing::info!("robots.txt Crawl-delay raises request interval to {:?}", interval);
            }
            (robots, RateLimiter::after_grant(interval, requested_at))
        } else {
            (ParsedRobots::allow_all(), RateLimiter::new(configured))
        };

        let robots = Arc::new(robots);
        let limiter = Arc::new(limiter);
        let window = self.config.crawler.max_concurrent_fetches.max(1) as usize;

        let mut in_flight: VecDeque<FetchTask> = VecDeque::with_capacity(window);
        let mut next_to_spawn = 1;
        let mut books = Vec::new();

        for page in 1..=total_pages {
            if self.abort.is_aborted() {
                for task in &in_flight {
                    task.abort();
                }
                tracing::warn!(
                    "Crawl aborted before page {}; discarding {} books",
                    page,
                    books.len()
                );
                return Err(CatalogError::Aborted { next_page: page });
            }

            // Keep the window full; pages are spawned and consumed in order
            while next_to_spawn <= total_pages && in_flight.len() < window {
                in_flight.push_back(self.spawn_fetch(next_to_spawn, &agent, &robots, &limiter));
                next_to_spawn += 1;
            }

            session.advance(CrawlPhase::Fetching(page));
            let task = match in_flight.pop_front() {
                Some(task) => task,
                None => self.spawn_fetch(page, &agent, &robots, &limiter),
            };
            let result = task.await?;

            let document = match result {
                Ok(document) => document,
                Err(error) => {
                    tracing::warn!("Skipping page {}: {}", page, error);
                    session.record_fetch_failure(&error);
                    continue;
                }
            };

            session.advance(CrawlPhase::Extracting(page));
            let records = self.extractor.extract(&document);
            session.record_page_success(records.len());
            if records.is_empty() {
                tracing::info!("Page {} has no catalog items", page);
            }

            session.advance(CrawlPhase::Validating(page));
            let before = books.len();
            for raw in records {
                match self.validator.validate(raw) {
                    Ok(book) => {
                        session.record_accepted();
                        books.push(book);
                    }
                    Err(reason) => {
                        tracing::debug!("Page {}: dropped record ({})", page, reason);
                        session.record_rejected(reason);
                    }
                }
            }

            tracing::info!(
                "Page {}/{}: {} books accepted ({} total)",
                page,
                total_pages,
                books.len() - before,
                books.len()
            );
        }

        session.advance(CrawlPhase::Finalizing);
        let (books, result) = self.replace_snapshot(books).await?;

        let outcome = match result {
            Ok(info) => {
                tracing::info!(
                    "Snapshot {} now holds {} books",
                    info.id,
                    info.book_count
                );
                session.snapshot_id = Some(info.id);
                CrawlOutcome::Completed
            }
            Err(e) if e.is_uniqueness_violation() => {
                tracing::error!("Run degraded, previous snapshot kept: {}", e);
                CrawlOutcome::Degraded {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                tracing::error!("Snapshot replace failed, previous snapshot kept: {}", e);
                CrawlOutcome::StoreFailed {
                    reason: e.to_string(),
                }
            }
        };

        session.finish(outcome);
        tracing::info!("Crawl finished: {}", session.summary_line());

        Ok(CrawlReport { books, session })
    }

    /// Starts the fetch for one page on its own task
    ///
    /// Robots denials are decided here, before a rate limiter slot is taken.
    fn spawn_fetch(
        &self,
        page: u32,
        agent: &str,
        robots: &Arc<ParsedRobots>,
        limiter: &Arc<RateLimiter>,
    ) -> FetchTask {
        let fetcher = self.fetcher.clone();
        let agent = agent.to_string();
        let robots = Arc::clone(robots);
        let limiter = Arc::clone(limiter);

        tokio::spawn(async move {
            let url = fetcher
                .address()
                .page_url(page)
                .map_err(|source| FetchError::InvalidUrl { page, source })?;

            if !robots.is_allowed(url.as_str(), &agent) {
                return Err(FetchError::Disallowed {
                    page,
                    url: url.to_string(),
                });
            }

            limiter.acquire().await;
            fetcher.fetch(page).await
        })
    }

    /// Runs the blocking store write off the async workers
    async fn replace_snapshot(
        &self,
        books: Vec<Book>,
    ) -> Result<(Vec<Book>, StorageResult<SnapshotInfo>), CatalogError> {
        let store = Arc::clone(&self.store);
        let config_hash = self.config_hash.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let result = store.replace_all(&books, &config_hash);
            (books, result)
        })
        .await?;

        Ok(outcome)
    }
}

/// On-demand crawl trigger shared by every caller
///
/// Runs are serialized: a second `start_crawl` waits for the first to finish,
/// so two replaces never interleave.
pub struct CrawlService {
    config: Config,
    store: Arc<dyn SnapshotStore>,
    config_hash: String,
    run_lock: Mutex<()>,
    abort: AbortHandle,
}

impl CrawlService {
    pub fn new(config: Config, store: Arc<dyn SnapshotStore>, config_hash: impl Into<String>) -> Self {
        Self {
            config,
            store,
            config_hash: config_hash.into(),
            run_lock: Mutex::new(()),
            abort: AbortHandle::new(),
        }
    }

    /// The store runs write to; readers may query it at any time
    pub fn store(&self) -> Arc<dyn SnapshotStore> {
        Arc::clone(&self.store)
    }

    /// Handle that aborts the run in progress
    ///
    /// A request made while no run is active is cleared when the next run
    /// starts.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Whether a run currently holds the run lock
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Crawls the configured number of pages
    pub async fn start_crawl(&self) -> Result<CrawlSession, CatalogError> {
        self.crawl_pages(self.config.catalog.total_pages).await
    }

    /// Crawls pages `1..=total_pages`, waiting for any run in progress first
    pub async fn crawl_pages(&self, total_pages: u32) -> Result<CrawlSession, CatalogError> {
        let _guard = self.run_lock.lock().await;
        self.abort.reset();

        let coordinator = Coordinator::new(
            self.config.clone(),
            Arc::clone(&self.store),
            self.config_hash.clone(),
        )?
        .with_abort_handle(self.abort.clone());

        let report = coordinator.run(total_pages).await?;
        Ok(report.session)
    }
}

/// Runs one crawl against the configured SQLite database
///
/// # Example
///
/// ```no_run
/// use catalog_snapshot::config::load_config_with_hash;
/// use catalog_snapshot::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("catalog.toml"))?;
/// let session = run_crawl(config, hash).await?;
/// println!("{}", session.summary_line());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, config_hash: String) -> Result<CrawlSession, CatalogError> {
    let store = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let service = CrawlService::new(config, Arc::new(store), config_hash);
    service.start_crawl().await
}
