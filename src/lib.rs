//! Catalog Snapshot: a polite book catalog ingester
//!
//! This crate crawls a paginated HTML book catalog, extracts and validates
//! book records, and atomically replaces a persisted snapshot that read-only
//! consumers query for listings and statistics.

pub mod book;
pub mod catalog;
pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for catalog ingestion
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Crawl aborted before page {next_page}; no books were stored")]
    Aborted { next_page: u32 },

    #[error("Crawl run degraded, previous snapshot kept: {0}")]
    Degraded(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use book::{Book, RawRecord, Rating};
pub use config::Config;
pub use crawler::{CrawlService, Coordinator};
pub use state::{CrawlOutcome, CrawlPhase, CrawlSession};
pub use storage::{SnapshotStore, SqliteStorage};
