/// Crawl phase definitions for tracking a run's progress
///
/// A run moves through the catalog one page at a time:
/// `Idle → Fetching(p) → Extracting(p) → Validating(p) → Fetching(p+1) … → Finalizing → Done`.
/// A failed fetch skips straight to the next page.
use std::fmt;

/// Where a crawl run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Run created, no request issued yet
    Idle,

    /// Waiting on the document for a page
    Fetching(u32),

    /// Parsing a fetched page into raw records
    Extracting(u32),

    /// Turning a page's raw records into books
    Validating(u32),

    /// All pages attempted; handing the batch to the store
    Finalizing,

    /// Run over (completed, degraded or aborted)
    Done,
}

impl CrawlPhase {
    /// Returns true once the run can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The page this phase is working on, if any
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::Fetching(p) | Self::Extracting(p) | Self::Validating(p) => Some(*p),
            _ => None,
        }
    }

    /// Checks whether moving to `next` follows the run's state machine
    ///
    /// Any live phase may jump to `Done`, which covers aborts and fatal
    /// store failures.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        match (*self, next) {
            (Done, _) => false,
            (_, Done) => true,
            (Idle, Fetching(1)) => true,
            (Idle, Finalizing) => true,
            (Fetching(p), Extracting(q)) => p == q,
            (Fetching(p), Fetching(q)) => q == p + 1,
            (Fetching(_), Finalizing) => true,
            (Extracting(p), Validating(q)) => p == q,
            (Validating(p), Fetching(q)) => q == p + 1,
            (Validating(_), Finalizing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching(p) => write!(f, "fetching page {}", p),
            Self::Extracting(p) => write!(f, "extracting page {}", p),
            Self::Validating(p) => write!(f, "validating page {}", p),
            Self::Finalizing => write!(f, "finalizing"),
            Self::Done => write!(f, "done"),
        }
    }
}
