use crate::catalog::PAGE_PLACEHOLDER;
use crate::config::types::{CatalogConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Largest page count a crawl may target
pub const MAX_TOTAL_PAGES: u32 = 10_000;

/// Smallest allowed spacing between two catalog requests (milliseconds)
pub const MIN_POLITENESS_DELAY_MS: u64 = 100;

/// Largest allowed cap on a robots.txt Crawl-delay (seconds)
pub const MAX_CRAWL_DELAY_SECS: u64 = 3600;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_catalog_config(&config.catalog)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates catalog addressing
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    if base.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    if config.root_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "root-path cannot be empty".to_string(),
        ));
    }

    if !config.page_path_pattern.contains(PAGE_PLACEHOLDER) {
        return Err(ConfigError::Validation(format!(
            "page-path-pattern must contain '{}', got '{}'",
            PAGE_PLACEHOLDER, config.page_path_pattern
        )));
    }

    if config.total_pages < 1 || config.total_pages > MAX_TOTAL_PAGES {
        return Err(ConfigError::Validation(format!(
            "total-pages must be between 1 and {}, got {}",
            MAX_TOTAL_PAGES, config.total_pages
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.politeness_delay_ms < MIN_POLITENESS_DELAY_MS {
        return Err(ConfigError::Validation(format!(
            "politeness-delay-ms must be >= {}, got {}",
            MIN_POLITENESS_DELAY_MS, config.politeness_delay_ms
        )));
    }

    if config.max_crawl_delay_secs < 1 || config.max_crawl_delay_secs > MAX_CRAWL_DELAY_SECS {
        return Err(ConfigError::Validation(format!(
            "max-crawl-delay-secs must be between 1 and {}, got {}",
            MAX_CRAWL_DELAY_SECS, config.max_crawl_delay_secs
        )));
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 16 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-fetches must be between 1 and 16, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
