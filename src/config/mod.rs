//! Configuration module for catalog crawls
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use catalog_snapshot::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("catalog.toml")).unwrap();
//! println!("Crawling {} pages of {}", config.catalog.total_pages, config.catalog.base_url);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{CatalogConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig};
pub use validation::{MAX_CRAWL_DELAY_SECS, MAX_TOTAL_PAGES, MIN_POLITENESS_DELAY_MS};

pub use parser::{compute_config_hash, config_hash, load_config, load_config_with_hash, parse_config};
