//! Crawler module for catalog page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching of numbered catalog pages
//! - HTML record extraction
//! - Request pacing through a shared rate limiter
//! - Overall crawl coordination and run serialization

mod coordinator;
mod extractor;
mod fetcher;
mod scheduler;

pub use coordinator::{run_crawl, AbortHandle, Coordinator, CrawlReport, CrawlService};
pub use extractor::{is_in_stock, ItemSelectors, RecordExtractor};
pub use fetcher::{build_http_client, FetchError, PageFetcher, RawPageDocument};
pub use scheduler::{effective_delay, RateLimiter};
