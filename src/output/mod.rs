//! Output module for catalog statistics and summaries
//!
//! This module handles:
//! - Summarizing the stored snapshot (the stats reporter)
//! - Printing stats and crawl sessions to the console
//! - Exporting a markdown summary

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary, CatalogSummary};
pub use stats::{
    load_statistics, print_session, print_statistics, CatalogStats, PriceStats, StatsReporter,
};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
