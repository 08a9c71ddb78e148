//! Storage traits and error types
//!
//! This module defines the trait interface for snapshot backends and
//! associated error types.

use crate::book::Book;
use crate::storage::{BookFilter, BookPage, BookQuery, SnapshotAggregate, SnapshotInfo};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Whether the write broke the detail-URL uniqueness rule
    ///
    /// A uniqueness violation is a data-quality problem with the crawled
    /// batch; every other variant is a failure of the store itself.
    pub fn is_uniqueness_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for snapshot backends
///
/// Implementations are shared between the crawl writer and any number of
/// readers, so every method takes `&self` and the backend handles its own
/// synchronization. Reads only ever observe the current snapshot generation.
pub trait SnapshotStore: Send + Sync {
    // ===== Writes =====

    /// Replaces the whole book set with `books`
    ///
    /// Stages a new generation and swaps it in atomically: concurrent readers
    /// see either the previous complete snapshot or this one. Fails with
    /// `StorageError::ConstraintViolation` when two books share a detail URL,
    /// leaving the previous snapshot current.
    ///
    /// # Arguments
    ///
    /// * `books` - The new book set, in catalog order
    /// * `config_hash` - Hash of the configuration the batch was crawled with
    ///
    /// # Returns
    ///
    /// Metadata of the generation that is now current
    fn replace_all(&self, books: &[Book], config_hash: &str) -> StorageResult<SnapshotInfo>;

    // ===== Reads =====

    /// Metadata of the current generation, or None before the first replace
    fn current_snapshot(&self) -> StorageResult<Option<SnapshotInfo>>;

    /// Looks a book up by its stable id
    fn find_by_id(&self, id: &str) -> StorageResult<Option<Book>>;

    /// Looks a book up by its unique detail URL
    fn find_by_detail_url(&self, detail_url: &str) -> StorageResult<Option<Book>>;

    /// Counts books matching `filter`
    fn count(&self, filter: &BookFilter) -> StorageResult<u64>;

    /// Returns one page of a filtered, sorted listing
    ///
    /// Ties on the sort field keep catalog order.
    fn scan(&self, query: &BookQuery) -> StorageResult<BookPage>;

    /// Computes totals, price stats and rating breakdowns
    fn aggregate(&self) -> StorageResult<SnapshotAggregate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniqueness_violation_classification() {
        assert!(StorageError::ConstraintViolation("dup".to_string()).is_uniqueness_violation());
        assert!(!StorageError::Database("disk full".to_string()).is_uniqueness_violation());
        assert!(!StorageError::LockPoisoned.is_uniqueness_violation());
    }
}
