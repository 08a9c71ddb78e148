//! Robots.txt handling module
//!
//! The catalog host's robots.txt is read once per crawl run. Disallowed pages
//! are skipped, and a Crawl-delay longer than the configured politeness delay
//! slows the whole run down.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::PageFetcher;

/// Loads the robots.txt rules for the catalog host
///
/// A missing or unreachable file yields rules that allow everything.
pub async fn load_robots(fetcher: &PageFetcher) -> ParsedRobots {
    match fetcher.fetch_robots().await {
        Some(content) => {
            tracing::debug!("Loaded robots.txt ({} bytes)", content.len());
            ParsedRobots::from_content(&content)
        }
        None => ParsedRobots::allow_all(),
    }
}
