//! Storage module for the persisted book snapshot
//!
//! This module handles everything that outlives a crawl run:
//! - SQLite schema for snapshot generations and the current-generation pointer
//! - Atomic stage-then-swap replacement of the whole book set
//! - Filtered, sorted and paginated reads for query consumers
//! - Aggregates for the stats reporter
//!
//! Readers always see one complete generation, never a mix of two.

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::{SnapshotStore, StorageError, StorageResult};

use crate::book::{Book, Rating};
use crate::CatalogError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Page size used when a query does not set one
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Opens or creates the snapshot database at `path`
pub fn open_storage(path: &Path) -> Result<SqliteStorage, CatalogError> {
    SqliteStorage::new(path)
}

/// Metadata of a stored snapshot generation
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub book_count: u64,
    pub config_hash: String,
}

/// Field a listing is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Title,
    Price,
    Rating,
    ScrapedAt,
}

impl SortField {
    /// Parses a sort field name; unknown names fall back to title
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "price" => Self::Price,
            "rating" => Self::Rating,
            "scraped_at" | "scrapedat" | "createdat" | "created_at" => Self::ScrapedAt,
            _ => Self::Title,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Price => "price",
            Self::Rating => "rating",
            Self::ScrapedAt => "scraped_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// `desc` (any case) sorts descending, anything else ascending
    pub fn parse(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Predicate over books in the current snapshot
///
/// Unset fields match everything. Ranges that make no sense are ignored
/// rather than rejected, see [`BookFilter::rating_range`] and
/// [`BookFilter::price_range`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    /// Case-insensitive title substring
    pub search: Option<String>,
    pub min_rating: Option<u8>,
    pub max_rating: Option<u8>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub in_stock: Option<bool>,
}

impl BookFilter {
    /// Trimmed, non-empty search term
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Inclusive rating bounds, applied only when the upper bound is within
    /// the 0..=5 scale
    pub fn rating_range(&self) -> Option<(u8, u8)> {
        if self.min_rating.is_none() && self.max_rating.is_none() {
            return None;
        }
        let min = self.min_rating.unwrap_or(0);
        let max = self.max_rating.unwrap_or(5);
        (min <= 5 && max <= 5).then_some((min, max))
    }

    /// Inclusive price bounds, applied only when min >= 0 and max > min
    pub fn price_range(&self) -> Option<(f64, f64)> {
        if self.min_price.is_none() && self.max_price.is_none() {
            return None;
        }
        let min = self.min_price.unwrap_or(0.0);
        let max = self.max_price.unwrap_or(f64::MAX);
        (min >= 0.0 && max > min).then_some((min, max))
    }

    /// Evaluates the predicate against one book
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(term) = self.search_term() {
            if !book
                .title
                .to_ascii_lowercase()
                .contains(&term.to_ascii_lowercase())
            {
                return false;
            }
        }
        if let Some((min, max)) = self.rating_range() {
            let rating = book.rating_value();
            if rating < min || rating > max {
                return false;
            }
        }
        if let Some((min, max)) = self.price_range() {
            if book.price < min || book.price > max {
                return false;
            }
        }
        if let Some(in_stock) = self.in_stock {
            if book.in_stock != in_stock {
                return false;
            }
        }
        true
    }
}

/// A filtered, sorted and paginated listing request
#[derive(Debug, Clone, PartialEq)]
pub struct BookQuery {
    pub filter: BookFilter,
    pub sort_by: SortField,
    pub sort_order: SortOrder,

    /// 1-based page number
    pub page: u32,
    pub limit: u32,
}

impl Default for BookQuery {
    fn default() -> Self {
        Self {
            filter: BookFilter::default(),
            sort_by: SortField::Title,
            sort_order: SortOrder::Asc,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl BookQuery {
    /// Page number clamped to at least 1
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Limit clamped to at least 1
    pub fn limit(&self) -> u32 {
        self.limit.max(1)
    }

    /// Number of rows skipped before this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }
}

/// One page of a listing
#[derive(Debug, Clone)]
pub struct BookPage {
    pub books: Vec<Book>,

    /// Matching books across all pages
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl BookPage {
    /// Assembles a page and derives the pagination fields
    pub fn new(books: Vec<Book>, total: u64, query: &BookQuery) -> Self {
        let page = query.page();
        let limit = query.limit();
        let total_pages = total.div_ceil(u64::from(limit)) as u32;

        Self {
            books,
            total,
            page,
            limit,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// Number of books with one rating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingCount {
    pub rating: Rating,
    pub count: u64,
}

/// Number of books with one rating and stock status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockByRating {
    pub rating: Rating,
    pub in_stock: bool,
    pub count: u64,
}

/// Raw aggregates over the current snapshot
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotAggregate {
    pub total: u64,
    pub in_stock: u64,

    /// Price bounds and mean; all 0 when the snapshot is empty
    pub min_price: f64,
    pub avg_price: f64,
    pub max_price: f64,

    /// Ratings present in the snapshot, ascending
    pub rating_distribution: Vec<RatingCount>,

    /// Rating ascending, then in-stock before out-of-stock
    pub stock_by_rating: Vec<StockByRating>,
}

impl SnapshotAggregate {
    /// Computes aggregates over an in-memory book set
    pub fn from_books<'a>(books: impl IntoIterator<Item = &'a Book>) -> Self {
        let mut aggregate = Self::default();
        let mut price_sum = 0.0;
        let mut min_price = f64::INFINITY;
        let mut max_price = f64::NEG_INFINITY;
        let mut by_rating = [0u64; 6];
        let mut by_rating_stock = [[0u64; 2]; 6];

        for book in books {
            aggregate.total += 1;
            if book.in_stock {
                aggregate.in_stock += 1;
            }
            price_sum += book.price;
            min_price = min_price.min(book.price);
            max_price = max_price.max(book.price);

            let rating = usize::from(book.rating_value());
            by_rating[rating] += 1;
            by_rating_stock[rating][usize::from(book.in_stock)] += 1;
        }

        if aggregate.total > 0 {
            aggregate.min_price = min_price;
            aggregate.max_price = max_price;
            aggregate.avg_price = price_sum / aggregate.total as f64;
        }

        for rating in Rating::ALL {
            let idx = usize::from(rating.value());
            if by_rating[idx] > 0 {
                aggregate.rating_distribution.push(RatingCount {
                    rating,
                    count: by_rating[idx],
                });
            }
            for in_stock in [true, false] {
                let count = by_rating_stock[idx][usize::from(in_stock)];
                if count > 0 {
                    aggregate.stock_by_rating.push(StockByRating {
                        rating,
                        in_stock,
                        count,
                    });
                }
            }
        }

        aggregate
    }

    pub fn out_of_stock(&self) -> u64 {
        self.total - self.in_stock
    }
}
