//! Markdown summary generation
//!
//! This module renders the current snapshot's statistics, its metadata and,
//! when available, the session of the run that produced it.

use crate::output::stats::{load_statistics, CatalogStats};
use crate::output::OutputResult;
use crate::state::CrawlSession;
use crate::storage::{SnapshotInfo, SnapshotStore};
use crate::CatalogError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Everything the markdown summary shows
#[derive(Debug, Clone)]
pub struct CatalogSummary {
    /// None before the first successful crawl
    pub snapshot: Option<SnapshotInfo>,
    pub stats: CatalogStats,
    pub session: Option<CrawlSession>,
}

impl CatalogSummary {
    /// Reads snapshot metadata and stats from the store
    pub fn load(
        store: &dyn SnapshotStore,
        session: Option<CrawlSession>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            snapshot: store.current_snapshot()?,
            stats: load_statistics(store)?,
            session,
        })
    }
}

/// Writes the markdown summary to `output_path`
///
/// # Arguments
///
/// * `summary` - The catalog summary data
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_summary(summary: &CatalogSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a catalog summary as markdown
pub fn format_markdown_summary(summary: &CatalogSummary) -> String {
    let mut md = String::new();
    let stats = &summary.stats;

    md.push_str("# Catalog Snapshot Summary\n\n");

    md.push_str("## Snapshot\n\n");
    match &summary.snapshot {
        Some(info) => {
            md.push_str(&format!("- **Generation**: {}\n", info.id));
            md.push_str(&format!("- **Created**: {}\n", info.created_at.to_rfc3339()));
            md.push_str(&format!("- **Books**: {}\n", info.book_count));
            md.push_str(&format!("- **Config Hash**: {}\n\n", info.config_hash));
        }
        None => md.push_str("No snapshot has been stored yet.\n\n"),
    }

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Total Books**: {}\n", stats.total));
    md.push_str(&format!(
        "- **In Stock**: {} ({}%)\n",
        stats.in_stock, stats.stock_percentage
    ));
    md.push_str(&format!("- **Out of Stock**: {}\n", stats.out_of_stock));
    md.push_str(&format!(
        "- **Price**: min £{:.2}, avg £{:.2}, max £{:.2}\n\n",
        stats.price_stats.min, stats.price_stats.avg, stats.price_stats.max
    ));

    if !stats.rating_distribution.is_empty() {
        md.push_str("## Rating Distribution\n\n");
        md.push_str("| Rating | Books |\n");
        md.push_str("|--------|-------|\n");
        for entry in &stats.rating_distribution {
            md.push_str(&format!(
                "| {} ({}) | {} |\n",
                entry.rating,
                entry.rating.value(),
                entry.count
            ));
        }
        md.push('\n');
    }

    if !stats.stock_by_rating.is_empty() {
        md.push_str("## Stock by Rating\n\n");
        md.push_str("| Rating | Stock | Books |\n");
        md.push_str("|--------|-------|-------|\n");
        for entry in &stats.stock_by_rating {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                entry.rating,
                if entry.in_stock { "In stock" } else { "Out of stock" },
                entry.count
            ));
        }
        md.push('\n');
    }

    if let Some(session) = &summary.session {
        md.push_str("## Last Crawl\n\n");
        md.push_str(&format!(
            "- **Outcome**: {}\n",
            session
                .outcome
                .as_ref()
                .map(|o| o.label())
                .unwrap_or("unfinished")
        ));
        md.push_str(&format!("- **Started**: {}\n", session.started_at.to_rfc3339()));
        if let Some(duration) = session.duration() {
            md.push_str(&format!(
                "- **Duration**: {:.1} seconds\n",
                duration.num_milliseconds() as f64 / 1000.0
            ));
        }
        md.push_str(&format!(
            "- **Pages**: {} of {} succeeded ({} failed, {} empty)\n",
            session.pages_succeeded,
            session.pages_attempted,
            session.pages_failed(),
            session.empty_pages
        ));
        md.push_str(&format!(
            "- **Records**: {} accepted, {} rejected\n\n",
            session.records_accepted, session.records_rejected
        ));

        if !session.rejections.is_empty() {
            md.push_str("| Rejection | Records |\n");
            md.push_str("|-----------|---------|\n");
            for (reason, count) in &session.rejections {
                md.push_str(&format!("| {} | {} |\n", reason.label(), count));
            }
            md.push('\n');
        }

        if !session.failures.is_empty() {
            md.push_str("### Failed Pages\n\n");
            for failure in &session.failures {
                md.push_str(&format!("- page {}: {}\n", failure.page, failure.reason));
            }
            md.push('\n');
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::test_support::book;
    use crate::book::{Rating, Rejection};
    use crate::state::{CrawlOutcome, CrawlPhase, PageFailure};
    use crate::storage::MemoryStorage;

    fn create_test_session() -> CrawlSession {
        let mut session = CrawlSession::new(2);
        session.advance(CrawlPhase::Fetching(1));
        session.advance(CrawlPhase::Extracting(1));
        session.record_page_success(2);
        session.advance(CrawlPhase::Validating(1));
        session.record_accepted();
        session.record_rejected(Rejection::ZeroPrice);
        session.advance(CrawlPhase::Fetching(2));
        session.failures.push(PageFailure {
            page: 2,
            reason: "HTTP 503".to_string(),
        });
        session.advance(CrawlPhase::Finalizing);
        session.finish(CrawlOutcome::Completed);
        session
    }

    #[test]
    fn test_format_empty_store() {
        let store = MemoryStorage::new();
        let summary = CatalogSummary::load(&store, None).unwrap();
        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("# Catalog Snapshot Summary"));
        assert!(markdown.contains("No snapshot has been stored yet."));
        assert!(markdown.contains("**Total Books**: 0"));
        assert!(!markdown.contains("Rating Distribution"));
    }

    #[test]
    fn test_format_with_snapshot_and_session() {
        let store = MemoryStorage::new();
        store
            .replace_all(
                &[
                    book("a", 10.0, Rating::Four, true),
                    book("b", 30.0, Rating::Four, false),
                ],
                "abc123",
            )
            .unwrap();

        let summary = CatalogSummary::load(&store, Some(create_test_session())).unwrap();
        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("**Config Hash**: abc123"));
        assert!(markdown.contains("**In Stock**: 1 (50%)"));
        assert!(markdown.contains("min £10.00, avg £20.00, max £30.00"));
        assert!(markdown.contains("| Four (4) | 2 |"));
        assert!(markdown.contains("| Four | Out of stock | 1 |"));
        assert!(markdown.contains("**Outcome**: completed"));
        assert!(markdown.contains("| zero_price | 1 |"));
        assert!(markdown.contains("- page 2: HTTP 503"));
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");
        let summary = CatalogSummary::load(&MemoryStorage::new(), None).unwrap();

        generate_markdown_summary(&summary, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, format_markdown_summary(&summary));
    }
}
