//! State module for tracking crawl runs
//!
//! # Components
//!
//! - `CrawlPhase`: where a run is in its page-by-page state machine
//! - `CrawlSession`: counters and timestamps for one run, never persisted
//! - `CrawlOutcome`: how the run ended and whether the snapshot was replaced

mod crawl_phase;
mod crawl_session;

pub use crawl_phase::CrawlPhase;
pub use crawl_session::{CrawlOutcome, CrawlSession, PageFailure};
