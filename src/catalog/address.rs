use crate::config::CatalogConfig;
use url::Url;

/// Placeholder in the page path pattern that receives the page index
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Addressing rules for one catalog
///
/// Page 1 lives at the root path, pages 2..N follow the numbered pattern, and
/// every relative link found in a record is resolved against the same base
/// origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogAddress {
    base: Url,
    root_path: String,
    page_path_pattern: String,
}

impl CatalogAddress {
    /// Creates catalog addressing from a base origin
    ///
    /// The base is treated as a directory: `https://host/shop` and
    /// `https://host/shop/` address the same catalog.
    pub fn new(
        base_url: &str,
        root_path: &str,
        page_path_pattern: &str,
    ) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            base,
            root_path: root_path.trim_start_matches('/').to_string(),
            page_path_pattern: page_path_pattern.trim_start_matches('/').to_string(),
        })
    }

    /// Builds addressing from the `[catalog]` configuration table
    pub fn from_config(config: &CatalogConfig) -> Result<Self, url::ParseError> {
        Self::new(
            &config.base_url,
            &config.root_path,
            &config.page_path_pattern,
        )
    }

    /// The base origin all paths are relative to
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Returns the document URL for a 1-based page index
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_snapshot::catalog::CatalogAddress;
    ///
    /// let address = CatalogAddress::new(
    ///     "https://books.toscrape.com",
    ///     "index.html",
    ///     "catalogue/page-{page}.html",
    /// )
    /// .unwrap();
    /// assert_eq!(address.page_url(1).unwrap().as_str(), "https://books.toscrape.com/index.html");
    /// assert_eq!(
    ///     address.page_url(2).unwrap().as_str(),
    ///     "https://books.toscrape.com/catalogue/page-2.html"
    /// );
    /// ```
    pub fn page_url(&self, page: u32) -> Result<Url, url::ParseError> {
        if page <= 1 {
            self.base.join(&self.root_path)
        } else {
            let path = self
                .page_path_pattern
                .replace(PAGE_PLACEHOLDER, &page.to_string());
            self.base.join(&path)
        }
    }

    /// Resolves a relative record link against the base origin
    ///
    /// Returns None for links that cannot identify a catalog resource:
    /// - empty or fragment-only references
    /// - `javascript:`, `mailto:`, `tel:` and `data:` references
    /// - anything that does not resolve to an http(s) URL
    pub fn resolve(&self, reference: &str) -> Option<Url> {
        let reference = reference.trim();

        if reference.is_empty() || reference.starts_with('#') {
            return None;
        }

        let lowered = reference.to_ascii_lowercase();
        if lowered.starts_with("javascript:")
            || lowered.starts_with("mailto:")
            || lowered.starts_with("tel:")
            || lowered.starts_with("data:")
        {
            return None;
        }

        let mut resolved = self.base.join(reference).ok()?;
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            return None;
        }
        resolved.set_fragment(None);
        Some(resolved)
    }

    /// The robots.txt location for the catalog's host
    pub fn robots_url(&self) -> Result<Url, url::ParseError> {
        self.base.join("/robots.txt")
    }
}
