//! Statistics over the stored snapshot
//!
//! This module provides the read-only stats reporter used by the CLI and the
//! markdown summary, plus console printers for stats and crawl sessions.

use crate::state::CrawlSession;
use crate::storage::{RatingCount, SnapshotStore, StockByRating};
use crate::CatalogError;

/// Price bounds and mean; all 0 for an empty snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

/// Catalog statistics summary
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogStats {
    /// Books in the current snapshot
    pub total: u64,

    pub in_stock: u64,
    pub out_of_stock: u64,

    /// Share of books in stock, rounded to a whole percent
    pub stock_percentage: u32,

    pub price_stats: PriceStats,

    /// Ratings present in the snapshot, ascending
    pub rating_distribution: Vec<RatingCount>,

    /// Rating ascending, then in-stock first
    pub stock_by_rating: Vec<StockByRating>,
}

/// Rounded percentage of `part` in `total`, 0 when `total` is 0
pub fn stock_percentage(part: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u32
}

/// Computes catalog statistics from a snapshot store
pub struct StatsReporter<'a> {
    store: &'a dyn SnapshotStore,
}

impl<'a> StatsReporter<'a> {
    pub fn new(store: &'a dyn SnapshotStore) -> Self {
        Self { store }
    }

    /// Summarizes the current snapshot
    ///
    /// Pure read: one aggregate call against the store.
    pub fn summarize(&self) -> Result<CatalogStats, CatalogError> {
        let aggregate = self.store.aggregate()?;

        Ok(CatalogStats {
            total: aggregate.total,
            in_stock: aggregate.in_stock,
            out_of_stock: aggregate.out_of_stock(),
            stock_percentage: stock_percentage(aggregate.in_stock, aggregate.total),
            price_stats: PriceStats {
                min: aggregate.min_price,
                avg: aggregate.avg_price,
                max: aggregate.max_price,
            },
            rating_distribution: aggregate.rating_distribution,
            stock_by_rating: aggregate.stock_by_rating,
        })
    }
}

/// Loads statistics from storage
pub fn load_statistics(store: &dyn SnapshotStore) -> Result<CatalogStats, CatalogError> {
    StatsReporter::new(store).summarize()
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CatalogStats) {
    println!("=== Catalog Statistics ===\n");

    println!("Overview:");
    println!("  Total books: {}", stats.total);
    println!(
        "  In stock: {} ({}%)",
        stats.in_stock, stats.stock_percentage
    );
    println!("  Out of stock: {}", stats.out_of_stock);
    println!();

    println!("Prices:");
    println!("  Min: £{:.2}", stats.price_stats.min);
    println!("  Avg: £{:.2}", stats.price_stats.avg);
    println!("  Max: £{:.2}", stats.price_stats.max);
    println!();

    if !stats.rating_distribution.is_empty() {
        println!("Ratings:");
        for entry in &stats.rating_distribution {
            let share = if stats.total > 0 {
                (entry.count as f64 / stats.total as f64) * 100.0
            } else {
                0.0
            };
            println!(
                "  {} ({}): {} ({:.1}%)",
                entry.rating,
                entry.rating.value(),
                entry.count,
                share
            );
        }
        println!();
    }

    if !stats.stock_by_rating.is_empty() {
        println!("Stock by Rating:");
        for entry in &stats.stock_by_rating {
            println!(
                "  {} / {}: {}",
                entry.rating,
                if entry.in_stock { "in stock" } else { "out of stock" },
                entry.count
            );
        }
    }
}

/// Prints the summary of a finished crawl run
pub fn print_session(session: &CrawlSession) {
    println!("=== Crawl Session ===\n");
    println!(
        "  Outcome: {}",
        session
            .outcome
            .as_ref()
            .map(|o| o.label())
            .unwrap_or("unfinished")
    );
    println!("  Pages: {} targeted, {} attempted", session.target_pages, session.pages_attempted);
    println!(
        "  Pages: {} succeeded, {} failed, {} empty",
        session.pages_succeeded,
        session.pages_failed(),
        session.empty_pages
    );
    println!(
        "  Records: {} accepted, {} rejected",
        session.records_accepted, session.records_rejected
    );
    for (reason, count) in &session.rejections {
        println!("    - {}: {}", reason.label(), count);
    }
    if let Some(duration) = session.duration() {
        println!(
            "  Duration: {:.1}s",
            duration.num_milliseconds() as f64 / 1000.0
        );
    }
    for failure in &session.failures {
        println!("  ! page {}: {}", failure.page, failure.reason);
    }
    println!();
}
