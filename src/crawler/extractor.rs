//! HTML record extraction
//!
//! This module scans a catalog page for repeated item blocks and pulls the raw
//! fields out of each one:
//!
//! | Field | Source |
//! |-------|--------|
//! | title, detail ref | title link's `title` attribute and `href` |
//! | price text | price element text, trimmed |
//! | rating token | second class of the rating element |
//! | availability | stock element text, trimmed |
//! | image ref | item image `src` |
//!
//! Missing sub-elements leave the field empty; they never fail the page.

use crate::book::RawRecord;
use crate::crawler::RawPageDocument;
use crate::CatalogError;
use scraper::{ElementRef, Html, Selector};

/// CSS selectors describing the catalog's item markup
#[derive(Debug, Clone)]
pub struct ItemSelectors {
    pub item: String,
    pub title_link: String,
    pub price: String,
    pub rating: String,
    pub availability: String,
    pub image: String,
}

impl Default for ItemSelectors {
    fn default() -> Self {
        Self {
            item: "article.product_pod".to_string(),
            title_link: "h3 a".to_string(),
            price: "p.price_color".to_string(),
            rating: "p.star-rating".to_string(),
            availability: "p.instock.availability".to_string(),
            image: "div.image_container img".to_string(),
        }
    }
}

/// Derives stock status from availability text
///
/// True iff the text contains "in stock", ignoring case. Empty text is out of
/// stock.
pub fn is_in_stock(availability_text: &str) -> bool {
    availability_text.to_lowercase().contains("in stock")
}

/// Extracts raw records from catalog pages
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    item: Selector,
    title_link: Selector,
    price: Selector,
    rating: Selector,
    availability: Selector,
    image: Selector,
}

impl RecordExtractor {
    /// Compiles the given selectors
    pub fn new(selectors: &ItemSelectors) -> Result<Self, CatalogError> {
        Ok(Self {
            item: compile(&selectors.item)?,
            title_link: compile(&selectors.title_link)?,
            price: compile(&selectors.price)?,
            rating: compile(&selectors.rating)?,
            availability: compile(&selectors.availability)?,
            image: compile(&selectors.image)?,
        })
    }

    /// Extracts every record on a fetched page, in page order
    pub fn extract(&self, document: &RawPageDocument) -> Vec<RawRecord> {
        let html = Html::parse_document(&document.body);
        self.records(&html).collect()
    }

    /// Lazily walks the item blocks of a parsed document, in page order
    ///
    /// A document without item blocks yields nothing.
    pub fn records<'a>(&'a self, html: &'a Html) -> impl Iterator<Item = RawRecord> + 'a {
        html.select(&self.item)
            .map(move |block| self.extract_block(block))
    }

    fn extract_block(&self, block: ElementRef<'_>) -> RawRecord {
        let title_link = block.select(&self.title_link).next();

        let title = title_link
            .and_then(|a| a.value().attr("title"))
            .map(str::to_string);
        let detail_ref = title_link
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);

        let price_text = first_text(block, &self.price);

        // "star-rating Three": the word is the second class token
        let rating_token = block
            .select(&self.rating)
            .next()
            .and_then(|el| el.value().attr("class"))
            .and_then(|class| class.split_whitespace().nth(1))
            .map(str::to_string);

        let availability_text = first_text(block, &self.availability);
        let in_stock = is_in_stock(&availability_text);

        let image_ref = block
            .select(&self.image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string);

        RawRecord {
            title,
            price_text,
            rating_token,
            availability_text,
            in_stock,
            image_ref,
            detail_ref,
        }
    }
}

fn compile(selector: &str) -> Result<Selector, CatalogError> {
    Selector::parse(selector).map_err(|e| CatalogError::Selector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Trimmed text of the first match, or empty
fn first_text(block: ElementRef<'_>, selector: &Selector) -> String {
    block
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
