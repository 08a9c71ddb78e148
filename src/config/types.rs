use serde::Deserialize;

/// Main configuration structure for a catalog crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Where the catalog lives and how its pages are addressed
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Base origin every page path and record link is resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of page 1, relative to the base origin
    #[serde(rename = "root-path", default = "default_root_path")]
    pub root_path: String,

    /// Path of pages 2..N; `{page}` is replaced with the page index
    #[serde(rename = "page-path-pattern", default = "default_page_path_pattern")]
    pub page_path_pattern: String,

    /// Number of pages to crawl
    #[serde(rename = "total-pages", default = "default_total_pages")]
    pub total_pages: u32,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum time between two outbound requests to the catalog (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of page fetches allowed in flight at once
    #[serde(rename = "max-concurrent-fetches", default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: u32,

    /// Whether to consult the catalog's robots.txt before crawling
    #[serde(rename = "respect-robots", default = "default_respect_robots")]
    pub respect_robots: bool,

    /// Upper bound on a robots.txt Crawl-delay (seconds)
    #[serde(rename = "max-crawl-delay-secs", default = "default_max_crawl_delay_secs")]
    pub max_crawl_delay_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            politeness_delay_ms: default_politeness_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            respect_robots: default_respect_robots(),
            max_crawl_delay_secs: default_max_crawl_delay_secs(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite snapshot database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

fn default_root_path() -> String {
    "index.html".to_string()
}

fn default_page_path_pattern() -> String {
    "catalogue/page-{page}.html".to_string()
}

fn default_total_pages() -> u32 {
    50
}

fn default_politeness_delay_ms() -> u64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_fetches() -> u32 {
    1
}

fn default_respect_robots() -> bool {
    true
}

fn default_max_crawl_delay_secs() -> u64 {
    60
}
