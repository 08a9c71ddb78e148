//! Book records
//!
//! This module defines the two shapes a catalog item takes on its way through
//! the pipeline:
//!
//! - `RawRecord`: fields as extracted from one item block, unvalidated
//! - `Book`: the canonical record that is persisted in a snapshot
//!
//! `validator` turns the former into the latter.

mod rating;
mod validator;

pub use rating::Rating;
pub use validator::{parse_price, RecordValidator, Rejection};

use chrono::{DateTime, Utc};

/// Fields extracted from one catalog item block
///
/// A missing sub-element leaves the matching field empty rather than failing
/// the page. `in_stock` is derived during extraction from the availability
/// text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// Value of the title link's `title` attribute
    pub title: Option<String>,

    /// Trimmed text of the price element (e.g. `£51.77`)
    pub price_text: String,

    /// Second class token of the rating element (e.g. `Three`)
    pub rating_token: Option<String>,

    /// Trimmed text of the stock status element
    pub availability_text: String,

    /// Whether the availability text mentions "in stock"
    pub in_stock: bool,

    /// Image `src`, usually relative to the catalog base
    pub image_ref: Option<String>,

    /// Title link `href`, usually relative to the catalog base
    pub detail_ref: Option<String>,
}

/// A canonical catalog book
///
/// Invariants:
/// - `title` is non-empty
/// - `price` is finite and non-negative
/// - `rating` and `rating_text` always agree (both come from `Rating`)
/// - `detail_url` is unique within a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    /// Stable id derived from `detail_url`
    pub id: String,
    pub title: String,
    pub price: f64,
    /// Price as displayed by the catalog
    pub price_text: String,
    pub rating: Rating,
    pub availability_text: String,
    pub in_stock: bool,
    pub image_url: String,
    pub detail_url: String,
    pub scraped_at: DateTime<Utc>,
}

impl Book {
    /// Numeric rating (0–5)
    pub fn rating_value(&self) -> u8 {
        self.rating.value()
    }

    /// Ordinal rating word (`Zero`..`Five`)
    pub fn rating_text(&self) -> &'static str {
        self.rating.as_str()
    }

    /// Price rendered in the catalog's currency, two decimals
    pub fn formatted_price(&self) -> String {
        format!("£{:.2}", self.price)
    }

    /// Four stars or more
    pub fn is_highly_rated(&self) -> bool {
        self.rating >= Rating::Four
    }

    /// Whether two books carry the same catalog content, ignoring when they
    /// were scraped
    pub fn same_content(&self, other: &Book) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.price == other.price
            && self.price_text == other.price_text
            && self.rating == other.rating
            && self.availability_text == other.availability_text
            && self.in_stock == other.in_stock
            && self.image_url == other.image_url
            && self.detail_url == other.detail_url
    }
}
