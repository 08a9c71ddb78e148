//! Catalog addressing
//!
//! This module maps page indices to document URLs, resolves the relative links
//! found inside records, and derives the stable identifier of a book.

mod address;

pub use address::{CatalogAddress, PAGE_PLACEHOLDER};

use sha2::{Digest, Sha256};

/// Length of a book id in hex characters
pub const BOOK_ID_LEN: usize = 16;

/// Derives the stable id of a book from its detail URL
///
/// The id only depends on the detail URL, so a book keeps its id across
/// crawls of an unchanged catalog.
///
/// # Example
///
/// ```
/// use catalog_snapshot::catalog::book_id;
///
/// let id = book_id("https://books.toscrape.com/catalogue/sample_1/index.html");
/// assert_eq!(id.len(), 16);
/// assert_eq!(id, book_id("https://books.toscrape.com/catalogue/sample_1/index.html"));
/// ```
pub fn book_id(detail_url: &str) -> String {
    let digest = Sha256::digest(detail_url.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(BOOK_ID_LEN);
    id
}
