//! Record validation
//!
//! Turns a `RawRecord` into a canonical `Book`, or explains why it was dropped.
//! Rejections are not errors: the catalog is an uncontrolled source, so bad
//! records are counted and skipped.

use crate::book::{Book, RawRecord, Rating};
use crate::catalog::{book_id, CatalogAddress};
use chrono::{DateTime, Utc};
use std::fmt;

/// Why a raw record was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rejection {
    /// Title attribute absent or blank
    MissingTitle,

    /// Price text is not a non-negative number
    UnparseablePrice,

    /// Price parsed to exactly zero
    ///
    /// A zero price is treated the same as a missing one. This is a known
    /// quirk carried over from the catalog's historical ingestion rules; a
    /// free book is currently indistinguishable from a broken price.
    ZeroPrice,

    /// Image source absent or not resolvable
    MissingImage,

    /// Title link has no usable href, so the book has no unique key
    MissingDetailLink,
}

impl Rejection {
    /// Short machine-friendly label, used in logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingTitle => "missing_title",
            Self::UnparseablePrice => "unparseable_price",
            Self::ZeroPrice => "zero_price",
            Self::MissingImage => "missing_image",
            Self::MissingDetailLink => "missing_detail_link",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parses a displayed price such as `£51.77`
///
/// Leading currency glyphs are stripped and the remainder must parse as a
/// finite, non-negative decimal. Returns None otherwise.
///
/// # Example
///
/// ```
/// use catalog_snapshot::book::parse_price;
///
/// assert_eq!(parse_price("£12.50"), Some(12.50));
/// assert_eq!(parse_price("12.50"), Some(12.50));
/// assert_eq!(parse_price("£"), None);
/// ```
pub fn parse_price(text: &str) -> Option<f64> {
    let amount = text
        .trim()
        .trim_start_matches(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .trim();

    let price: f64 = amount.parse().ok()?;
    if !price.is_finite() || price < 0.0 {
        return None;
    }
    Some(price)
}

/// Validates raw records against one catalog's addressing
#[derive(Debug, Clone)]
pub struct RecordValidator {
    address: CatalogAddress,
}

impl RecordValidator {
    /// Creates a validator that resolves links against `address`
    pub fn new(address: CatalogAddress) -> Self {
        Self { address }
    }

    /// Validates a record, stamping it with the current time
    pub fn validate(&self, raw: RawRecord) -> Result<Book, Rejection> {
        self.validate_at(raw, Utc::now())
    }

    /// Validates a record with an explicit scrape timestamp
    ///
    /// Checks run in a fixed order: title, price, image, detail link. The
    /// first failing check is the reported rejection.
    pub fn validate_at(&self, raw: RawRecord, scraped_at: DateTime<Utc>) -> Result<Book, Rejection> {
        let title = raw
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(Rejection::MissingTitle)?
            .to_string();

        let price = parse_price(&raw.price_text).ok_or(Rejection::UnparseablePrice)?;
        if price == 0.0 {
            return Err(Rejection::ZeroPrice);
        }

        let image_url = raw
            .image_ref
            .as_deref()
            .and_then(|r| self.address.resolve(r))
            .ok_or(Rejection::MissingImage)?;

        let detail_url = raw
            .detail_ref
            .as_deref()
            .and_then(|r| self.address.resolve(r))
            .ok_or(Rejection::MissingDetailLink)?;

        let detail_url = detail_url.to_string();

        Ok(Book {
            id: book_id(&detail_url),
            title,
            price,
            price_text: raw.price_text,
            rating: Rating::from_token(raw.rating_token.as_deref()),
            availability_text: raw.availability_text,
            in_stock: raw.in_stock,
            image_url: image_url.to_string(),
            detail_url,
            scraped_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> RecordValidator {
        RecordValidator::new(
            CatalogAddress::new(
                "https://books.toscrape.com/",
                "index.html",
                "catalogue/page-{page}.html",
            )
            .unwrap(),
        )
    }

    fn sample() -> RawRecord {
        RawRecord {
            title: Some("Sample".to_string()),
            price_text: "£12.50".to_string(),
            rating_token: None,
            availability_text: "In stock (3 available)".to_string(),
            in_stock: true,
            image_ref: Some("media/cache/sample.jpg".to_string()),
            detail_ref: Some("catalogue/sample_1/index.html".to_string()),
        }
    }

    #[test]
    fn test_sample_record_becomes_book() {
        let book = validator().validate(sample()).unwrap();

        assert_eq!(book.title, "Sample");
        assert_eq!(book.price, 12.50);
        assert_eq!(book.price_text, "£12.50");
        assert_eq!(book.rating_value(), 0);
        assert_eq!(book.rating_text(), "Zero");
        assert!(book.in_stock);
        assert_eq!(
            book.image_url,
            "https://books.toscrape.com/media/cache/sample.jpg"
        );
        assert_eq!(
            book.detail_url,
            "https://books.toscrape.com/catalogue/sample_1/index.html"
        );
        assert_eq!(book.id, book_id(&book.detail_url));
    }

    #[test]
    fn test_price_parses_exactly() {
        for (text, expected) in [
            ("£51.77", 51.77),
            ("£0.01", 0.01),
            ("$1234.5", 1234.5),
            ("€ 9.99", 9.99),
            ("Â£53.74", 53.74),
            ("  £20.00 ", 20.0),
        ] {
            let price = parse_price(text).unwrap();
            assert_eq!(price, expected, "parsing {}", text);
            assert_eq!(format!("{:.2}", price), format!("{:.2}", expected));
        }
    }

    #[test]
    fn test_price_rejects_garbage() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("£"), None);
        assert_eq!(parse_price("£abc"), None);
        assert_eq!(parse_price("£-3.00"), None);
        assert_eq!(parse_price("NaN"), None);
        assert_eq!(parse_price("£12.50 each"), None);
    }

    #[test]
    fn test_missing_title_rejected() {
        let mut raw = sample();
        raw.title = None;
        assert_eq!(validator().validate(raw), Err(Rejection::MissingTitle));

        let mut raw = sample();
        raw.title = Some("   ".to_string());
        assert_eq!(validator().validate(raw), Err(Rejection::MissingTitle));
    }

    #[test]
    fn test_unparseable_price_rejected() {
        let mut raw = sample();
        raw.price_text = String::new();
        assert_eq!(validator().validate(raw), Err(Rejection::UnparseablePrice));
    }

    #[test]
    fn test_zero_price_treated_as_missing() {
        let mut raw = sample();
        raw.price_text = "£0.00".to_string();
        assert_eq!(validator().validate(raw), Err(Rejection::ZeroPrice));
    }

    #[test]
    fn test_missing_image_rejected() {
        let mut raw = sample();
        raw.image_ref = None;
        assert_eq!(validator().validate(raw), Err(Rejection::MissingImage));
    }

    #[test]
    fn test_missing_detail_link_rejected() {
        let mut raw = sample();
        raw.detail_ref = None;
        assert_eq!(validator().validate(raw), Err(Rejection::MissingDetailLink));
    }

    #[test]
    fn test_title_checked_before_price() {
        let raw = RawRecord::default();
        assert_eq!(validator().validate(raw), Err(Rejection::MissingTitle));
    }

    #[test]
    fn test_rating_token_mapped() {
        let mut raw = sample();
        raw.rating_token = Some("Four".to_string());
        let book = validator().validate(raw).unwrap();
        assert_eq!(book.rating, Rating::Four);
        assert_eq!(book.rating_text(), "Four");

        let mut raw = sample();
        raw.rating_token = Some("Eleven".to_string());
        let book = validator().validate(raw).unwrap();
        assert_eq!(book.rating, Rating::Zero);
    }

    #[test]
    fn test_title_is_trimmed() {
        let mut raw = sample();
        raw.title = Some("  Sample  ".to_string());
        assert_eq!(validator().validate(raw).unwrap().title, "Sample");
    }

    #[test]
    fn test_explicit_timestamp() {
        let at = "2024-01-02T03:04:05Z".parse::<DateTime<Utc>>().unwrap();
        let book = validator().validate_at(sample(), at).unwrap();
        assert_eq!(book.scraped_at, at);
    }
}
