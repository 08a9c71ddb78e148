use crate::book::Rejection;
use crate::crawler::FetchError;
use crate::state::CrawlPhase;
use crate::CatalogError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// How a crawl run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Every attempted page was processed and the snapshot was replaced
    Completed,

    /// The batch broke a data-quality rule (duplicate detail URL); the
    /// previous snapshot is still in place
    Degraded { reason: String },

    /// The store failed while replacing; the previous snapshot is still in
    /// place
    StoreFailed { reason: String },
}

impl CrawlOutcome {
    /// Whether the run's batch became the current snapshot
    pub fn snapshot_replaced(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Degraded { .. } => "degraded",
            Self::StoreFailed { .. } => "store_failed",
        }
    }
}

/// A page that could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page: u32,
    pub reason: String,
}

/// Transient state of one crawl run
///
/// Created when a run starts and handed back to the caller when it ends.
/// Nothing in here is persisted.
#[derive(Debug, Clone)]
pub struct CrawlSession {
    /// Number of pages the run was asked to crawl
    pub target_pages: u32,

    /// Pages whose fetch was attempted
    pub pages_attempted: u32,

    /// Pages fetched and extracted
    pub pages_succeeded: u32,

    /// Successful pages that held no item blocks
    pub empty_pages: u32,

    /// Pages skipped because their fetch failed
    pub failures: Vec<PageFailure>,

    /// Records that became books
    pub records_accepted: u64,

    /// Records dropped by validation
    pub records_rejected: u64,

    /// Rejections broken down by reason
    pub rejections: BTreeMap<Rejection, u64>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Current position in the run's state machine
    pub phase: CrawlPhase,

    /// Set once the run reaches `Done`
    pub outcome: Option<CrawlOutcome>,

    /// Generation id of the snapshot written by this run
    pub snapshot_id: Option<i64>,
}

impl CrawlSession {
    /// Starts a session for a run over `target_pages` pages
    pub fn new(target_pages: u32) -> Self {
        Self {
            target_pages,
            pages_attempted: 0,
            pages_succeeded: 0,
            empty_pages: 0,
            failures: Vec::new(),
            records_accepted: 0,
            records_rejected: 0,
            rejections: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
            phase: CrawlPhase::Idle,
            outcome: None,
            snapshot_id: None,
        }
    }

    /// Moves the run to its next phase
    pub fn advance(&mut self, next: CrawlPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid crawl transition: {} -> {}",
            self.phase,
            next
        );
        tracing::trace!("Crawl phase: {} -> {}", self.phase, next);
        if let CrawlPhase::Fetching(_) = next {
            self.pages_attempted += 1;
        }
        self.phase = next;
    }

    /// Records a page whose fetch failed
    pub fn record_fetch_failure(&mut self, error: &FetchError) {
        self.failures.push(PageFailure {
            page: error.page(),
            reason: error.to_string(),
        });
    }

    /// Records a page that was fetched and extracted
    pub fn record_page_success(&mut self, record_count: usize) {
        self.pages_succeeded += 1;
        if record_count == 0 {
            self.empty_pages += 1;
        }
    }

    pub fn record_accepted(&mut self) {
        self.records_accepted += 1;
    }

    pub fn record_rejected(&mut self, reason: Rejection) {
        self.records_rejected += 1;
        *self.rejections.entry(reason).or_insert(0) += 1;
    }

    /// Ends the run with the given outcome
    pub fn finish(&mut self, outcome: CrawlOutcome) {
        self.advance(CrawlPhase::Done);
        self.finished_at = Some(Utc::now());
        self.outcome = Some(outcome);
    }

    /// Number of pages skipped because of fetch failures
    pub fn pages_failed(&self) -> u32 {
        self.failures.len() as u32
    }

    /// Wall-clock duration, once finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    /// Turns a run that kept the previous snapshot into an error
    pub fn ensure_replaced(&self) -> Result<(), CatalogError> {
        match &self.outcome {
            Some(CrawlOutcome::Completed) => Ok(()),
            Some(CrawlOutcome::Degraded { reason }) | Some(CrawlOutcome::StoreFailed { reason }) => {
                Err(CatalogError::Degraded(reason.clone()))
            }
            None => Err(CatalogError::Degraded(format!(
                "run stopped while {}",
                self.phase
            ))),
        }
    }

    /// One-line summary for logs
    pub fn summary_line(&self) -> String {
        format!(
            "pages {}/{} succeeded ({} failed, {} empty), records {} accepted / {} rejected, outcome {}",
            self.pages_succeeded,
            self.pages_attempted,
            self.pages_failed(),
            self.empty_pages,
            self.records_accepted,
            self.records_rejected,
            self.outcome.as_ref().map(CrawlOutcome::label).unwrap_or("running")
        )
    }
}
