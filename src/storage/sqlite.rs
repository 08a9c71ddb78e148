//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the SnapshotStore
//! trait. Replacement is staged-then-swap: one IMMEDIATE transaction writes
//! the new generation, moves the pointer to it and drops older generations.
//! Reads resolve the pointer inside the statement (or inside one
//! read transaction when a call issues several statements), so they never
//! straddle two generations.

use crate::book::{Book, Rating};
use crate::storage::schema::{initialize_schema, CURRENT_SNAPSHOT};
use crate::storage::traits::{SnapshotStore, StorageError, StorageResult};
use crate::storage::{
    BookFilter, BookPage, BookQuery, RatingCount, SnapshotAggregate, SnapshotInfo, StockByRating,
};
use crate::CatalogError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const BOOK_COLUMNS: &str = "id, title, price, price_text, rating, availability_text, \
                            in_stock, image_url, detail_url, scraped_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CatalogError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;

        // Readers keep working while a replace is being written
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl SnapshotStore for SqliteStorage {
    fn replace_all(&self, books: &[Book], config_hash: &str) -> StorageResult<SnapshotInfo> {
        let mut conn = self.lock()?;
        let created_at = Utc::now();

        // Stage. Nothing here is visible until commit, and any error drops
        // the transaction, rolling the whole replace back.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO snapshots (created_at, book_count, config_hash) VALUES (?1, ?2, ?3)",
            params![format_timestamp(&created_at), books.len() as i64, config_hash],
        )?;
        let snapshot_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO books (snapshot_id, position, id, title, price, price_text,
                 rating, rating_text, availability_text, in_stock, image_url, detail_url,
                 scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for (position, book) in books.iter().enumerate() {
                stmt.execute(params![
                    snapshot_id,
                    position as i64,
                    book.id,
                    book.title,
                    book.price,
                    book.price_text,
                    book.rating_value(),
                    book.rating_text(),
                    book.availability_text,
                    book.in_stock,
                    book.image_url,
                    book.detail_url,
                    format_timestamp(&book.scraped_at),
                ])
                .map_err(|e| map_write_error(e, book))?;
            }
        }

        // Swap and drop older generations in the same transaction
        tx.execute(
            "INSERT OR REPLACE INTO snapshot_pointer (slot, snapshot_id) VALUES (1, ?1)",
            params![snapshot_id],
        )?;
        tx.execute(
            "DELETE FROM books WHERE snapshot_id <> ?1",
            params![snapshot_id],
        )?;
        tx.execute("DELETE FROM snapshots WHERE id <> ?1", params![snapshot_id])?;
        tx.commit()?;

        tracing::debug!(
            "Snapshot generation {} is current ({} books)",
            snapshot_id,
            books.len()
        );

        Ok(SnapshotInfo {
            id: snapshot_id,
            created_at,
            book_count: books.len() as u64,
            config_hash: config_hash.to_string(),
        })
    }

    fn current_snapshot(&self) -> StorageResult<Option<SnapshotInfo>> {
        let conn = self.lock()?;
        let info = conn
            .query_row(
                "SELECT s.id, s.created_at, s.book_count, s.config_hash
                 FROM snapshot_pointer p JOIN snapshots s ON s.id = p.snapshot_id
                 WHERE p.slot = 1",
                [],
                |row| {
                    let created_at: String = row.get(1)?;
                    Ok(SnapshotInfo {
                        id: row.get(0)?,
                        created_at: parse_timestamp(1, &created_at)?,
                        book_count: row.get::<_, i64>(2)? as u64,
                        config_hash: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    fn find_by_id(&self, id: &str) -> StorageResult<Option<Book>> {
        let conn = self.lock()?;
        let book = conn
            .query_row(
                &format!(
                    "SELECT {} FROM books WHERE snapshot_id = {} AND id = ?1",
                    BOOK_COLUMNS, CURRENT_SNAPSHOT
                ),
                params![id],
                row_to_book,
            )
            .optional()?;
        Ok(book)
    }

    fn find_by_detail_url(&self, detail_url: &str) -> StorageResult<Option<Book>> {
        let conn = self.lock()?;
        let book = conn
            .query_row(
                &format!(
                    "SELECT {} FROM books WHERE snapshot_id = {} AND detail_url = ?1",
                    BOOK_COLUMNS, CURRENT_SNAPSHOT
                ),
                params![detail_url],
                row_to_book,
            )
            .optional()?;
        Ok(book)
    }

    fn count(&self, filter: &BookFilter) -> StorageResult<u64> {
        let conn = self.lock()?;
        let (clause, values) = filter_clause(filter);
        let values: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM books WHERE {}", clause),
            values.as_slice(),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn scan(&self, query: &BookQuery) -> StorageResult<BookPage> {
        let mut conn = self.lock()?;
        let (clause, values) = filter_clause(&query.filter);
        let values: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

        // Count and page must come from the same generation
        let tx = conn.transaction()?;
        let total: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM books WHERE {}", clause),
            values.as_slice(),
            |row| row.get(0),
        )?;

        let books = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM books WHERE {} ORDER BY {} {}, position ASC LIMIT {} OFFSET {}",
                BOOK_COLUMNS,
                clause,
                query.sort_by.column(),
                query.sort_order.keyword(),
                query.limit(),
                query.offset(),
            ))?;
            let rows = stmt.query_map(values.as_slice(), row_to_book)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        tx.commit()?;

        Ok(BookPage::new(books, total as u64, query))
    }

    fn aggregate(&self) -> StorageResult<SnapshotAggregate> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut aggregate = tx.query_row(
            &format!(
                "SELECT COUNT(*), COALESCE(SUM(in_stock), 0), COALESCE(MIN(price), 0.0),
                 COALESCE(AVG(price), 0.0), COALESCE(MAX(price), 0.0)
                 FROM books WHERE snapshot_id = {}",
                CURRENT_SNAPSHOT
            ),
            [],
            |row| {
                Ok(SnapshotAggregate {
                    total: row.get::<_, i64>(0)? as u64,
                    in_stock: row.get::<_, i64>(1)? as u64,
                    min_price: row.get(2)?,
                    avg_price: row.get(3)?,
                    max_price: row.get(4)?,
                    rating_distribution: Vec::new(),
                    stock_by_rating: Vec::new(),
                })
            },
        )?;

        {
            let mut stmt = tx.prepare(&format!(
                "SELECT rating, COUNT(*) FROM books WHERE snapshot_id = {}
                 GROUP BY rating ORDER BY rating ASC",
                CURRENT_SNAPSHOT
            ))?;
            let rows = stmt.query_map([], |row| {
                Ok(RatingCount {
                    rating: rating_from_column(row.get(0)?),
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?;
            aggregate.rating_distribution = rows.collect::<Result<Vec<_>, _>>()?;
        }

        {
            let mut stmt = tx.prepare(&format!(
                "SELECT rating, in_stock, COUNT(*) FROM books WHERE snapshot_id = {}
                 GROUP BY rating, in_stock ORDER BY rating ASC, in_stock DESC",
                CURRENT_SNAPSHOT
            ))?;
            let rows = stmt.query_map([], |row| {
                Ok(StockByRating {
                    rating: rating_from_column(row.get(0)?),
                    in_stock: row.get(1)?,
                    count: row.get::<_, i64>(2)? as u64,
                })
            })?;
            aggregate.stock_by_rating = rows.collect::<Result<Vec<_>, _>>()?;
        }

        tx.commit()?;
        Ok(aggregate)
    }
}

/// Builds the WHERE clause for a filter, scoped to the current generation
fn filter_clause(filter: &BookFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clause = format!("snapshot_id = {}", CURRENT_SNAPSHOT);
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(term) = filter.search_term() {
        values.push(Box::new(term.to_ascii_lowercase()));
        clause.push_str(&format!(" AND instr(lower(title), ?{}) > 0", values.len()));
    }

    if let Some((min, max)) = filter.rating_range() {
        values.push(Box::new(i64::from(min)));
        values.push(Box::new(i64::from(max)));
        clause.push_str(&format!(
            " AND rating BETWEEN ?{} AND ?{}",
            values.len() - 1,
            values.len()
        ));
    }

    if let Some((min, max)) = filter.price_range() {
        values.push(Box::new(min));
        values.push(Box::new(max));
        clause.push_str(&format!(
            " AND price BETWEEN ?{} AND ?{}",
            values.len() - 1,
            values.len()
        ));
    }

    if let Some(in_stock) = filter.in_stock {
        values.push(Box::new(in_stock));
        clause.push_str(&format!(" AND in_stock = ?{}", values.len()));
    }

    (clause, values)
}

fn row_to_book(row: &Row<'_>) -> rusqlite::Result<Book> {
    let scraped_at: String = row.get(9)?;
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        price: row.get(2)?,
        price_text: row.get(3)?,
        rating: rating_from_column(row.get(4)?),
        availability_text: row.get(5)?,
        in_stock: row.get(6)?,
        image_url: row.get(7)?,
        detail_url: row.get(8)?,
        scraped_at: parse_timestamp(9, &scraped_at)?,
    })
}

fn rating_from_column(value: u8) -> Rating {
    Rating::from_value(value).unwrap_or(Rating::Zero)
}

/// Fixed-width RFC 3339 so text order matches time order
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn map_write_error(error: rusqlite::Error, book: &Book) -> StorageError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &error {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return StorageError::ConstraintViolation(format!(
                "duplicate detail URL in batch: {}",
                book.detail_url
            ));
        }
    }
    StorageError::Sqlite(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::test_support::book;
    use crate::storage::{SortField, SortOrder};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn catalog() -> Vec<Book> {
        vec![
            book("sharp-objects", 47.82, Rating::Four, true),
            book("a-light-in-the-attic", 51.77, Rating::Three, true),
            book("tipping-the-velvet", 53.74, Rating::One, false),
            book("soumission", 50.10, Rating::One, true),
        ]
    }

    #[test]
    fn test_empty_store() {
        let storage = SqliteStorage::new_in_memory().unwrap();

        assert!(storage.current_snapshot().unwrap().is_none());
        assert_eq!(storage.count(&BookFilter::default()).unwrap(), 0);
        assert_eq!(storage.aggregate().unwrap(), SnapshotAggregate::default());
        assert!(storage.find_by_id("0123456789abcdef").unwrap().is_none());
    }

    #[test]
    fn test_replace_and_find() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let books = catalog();

        let info = storage.replace_all(&books, "hash-1").unwrap();
        assert_eq!(info.book_count, 4);
        assert_eq!(info.config_hash, "hash-1");
        assert_eq!(storage.current_snapshot().unwrap(), Some(info));

        let found = storage.find_by_id(&books[1].id).unwrap().unwrap();
        assert!(found.same_content(&books[1]));
        assert_eq!(found.scraped_at, books[1].scraped_at);
        assert_eq!(found.rating_text(), "Three");

        let by_url = storage
            .find_by_detail_url(&books[2].detail_url)
            .unwrap()
            .unwrap();
        assert_eq!(by_url.id, books[2].id);
        assert!(!by_url.in_stock);
    }

    #[test]
    fn test_replace_drops_previous_generation() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let first = catalog();
        storage.replace_all(&first, "hash-1").unwrap();

        let second = vec![book("the-requiem-red", 22.65, Rating::One, true)];
        let info = storage.replace_all(&second, "hash-2").unwrap();

        assert_eq!(storage.count(&BookFilter::default()).unwrap(), 1);
        assert!(storage.find_by_id(&first[0].id).unwrap().is_none());
        assert_eq!(storage.current_snapshot().unwrap().unwrap().id, info.id);

        let conn = storage.lock().unwrap();
        let generations: i64 = conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))
            .unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
            .unwrap();
        assert_eq!(generations, 1);
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_replace_with_empty_batch() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.replace_all(&catalog(), "hash-1").unwrap();

        let info = storage.replace_all(&[], "hash-2").unwrap();
        assert_eq!(info.book_count, 0);
        assert_eq!(storage.count(&BookFilter::default()).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_detail_url_keeps_previous_snapshot() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let original = catalog();
        let before = storage.replace_all(&original, "hash-1").unwrap();

        let mut batch = vec![book("new-book", 12.0, Rating::Two, true)];
        batch.push(batch[0].clone());

        let error = storage.replace_all(&batch, "hash-2").unwrap_err();
        assert!(error.is_uniqueness_violation());
        assert!(error.to_string().contains("new-book"));

        assert_eq!(storage.current_snapshot().unwrap(), Some(before));
        assert_eq!(storage.count(&BookFilter::default()).unwrap(), 4);
        assert!(storage.find_by_id(&original[0].id).unwrap().is_some());
        assert!(storage.find_by_id(&batch[0].id).unwrap().is_none());
    }

    #[test]
    fn test_failed_swap_leaves_no_staged_generation() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let before = storage.replace_all(&catalog(), "hash-1").unwrap();

        storage
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TEMP TRIGGER block_swap BEFORE INSERT ON snapshot_pointer
                 BEGIN SELECT RAISE(ABORT, 'swap blocked'); END;",
            )
            .unwrap();

        let batch = vec![book("the-requiem-red", 22.65, Rating::One, true)];
        assert!(storage.replace_all(&batch, "hash-2").is_err());

        assert_eq!(storage.current_snapshot().unwrap(), Some(before));
        let conn = storage.lock().unwrap();
        let generations: i64 = conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))
            .unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
            .unwrap();
        assert_eq!(generations, 1);
        assert_eq!(rows, 4);
    }

    #[test]
    fn test_count_with_filter() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.replace_all(&catalog(), "hash").unwrap();

        let in_stock = BookFilter {
            in_stock: Some(true),
            ..BookFilter::default()
        };
        assert_eq!(storage.count(&in_stock).unwrap(), 3);

        let one_star = BookFilter {
            min_rating: Some(1),
            max_rating: Some(1),
            ..BookFilter::default()
        };
        assert_eq!(storage.count(&one_star).unwrap(), 2);

        let search = BookFilter {
            search: Some("ATTIC".to_string()),
            ..BookFilter::default()
        };
        assert_eq!(storage.count(&search).unwrap(), 1);

        let price = BookFilter {
            min_price: Some(50.0),
            max_price: Some(52.0),
            ..BookFilter::default()
        };
        assert_eq!(storage.count(&price).unwrap(), 2);
    }

    #[test]
    fn test_scan_sorts_and_paginates() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.replace_all(&catalog(), "hash").unwrap();

        let query = BookQuery {
            sort_by: SortField::Price,
            sort_order: SortOrder::Desc,
            page: 1,
            limit: 3,
            ..BookQuery::default()
        };
        let page = storage.scan(&query).unwrap();
        let prices: Vec<f64> = page.books.iter().map(|b| b.price).collect();
        assert_eq!(prices, vec![53.74, 51.77, 50.10]);
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert!(page.has_next_page);
        assert!(!page.has_prev_page);

        let page = storage.scan(&BookQuery { page: 2, ..query }).unwrap();
        assert_eq!(page.books.len(), 1);
        assert_eq!(page.books[0].price, 47.82);
        assert!(!page.has_next_page);
        assert!(page.has_prev_page);
    }

    #[test]
    fn test_scan_ties_keep_catalog_order() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let books = catalog();
        storage.replace_all(&books, "hash").unwrap();

        let query = BookQuery {
            sort_by: SortField::Rating,
            filter: BookFilter {
                max_rating: Some(1),
                ..BookFilter::default()
            },
            ..BookQuery::default()
        };
        let page = storage.scan(&query).unwrap();
        let ids: Vec<&str> = page.books.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec![books[2].id.as_str(), books[3].id.as_str()]);
    }

    #[test]
    fn test_aggregate() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let books = catalog();
        storage.replace_all(&books, "hash").unwrap();

        let aggregate = storage.aggregate().unwrap();
        let expected = SnapshotAggregate::from_books(&books);

        assert_eq!(aggregate.total, expected.total);
        assert_eq!(aggregate.in_stock, expected.in_stock);
        assert_eq!(aggregate.min_price, expected.min_price);
        assert_eq!(aggregate.max_price, expected.max_price);
        assert!((aggregate.avg_price - expected.avg_price).abs() < 1e-9);
        assert_eq!(aggregate.rating_distribution, expected.rating_distribution);
        assert_eq!(aggregate.stock_by_rating, expected.stock_by_rating);
    }

    #[test]
    fn test_replace_is_atomic_for_concurrent_readers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.db");

        let writer = SqliteStorage::new(&path).unwrap();
        let small: Vec<Book> = (0..3)
            .map(|i| book(&format!("small-{}", i), 10.0, Rating::One, true))
            .collect();
        let large: Vec<Book> = (0..40)
            .map(|i| book(&format!("large-{}", i), 20.0, Rating::Five, false))
            .collect();
        writer.replace_all(&small, "small").unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let done = Arc::clone(&done);
            let path = path.clone();
            std::thread::spawn(move || {
                let reader = SqliteStorage::new(&path).unwrap();
                let mut observations = 0;
                loop {
                    let finished = done.load(Ordering::SeqCst);

                    let count = reader.count(&BookFilter::default()).unwrap();
                    assert!(count == 3 || count == 40, "partial snapshot: {}", count);

                    let aggregate = reader.aggregate().unwrap();
                    assert!(aggregate.total == 3 || aggregate.total == 40);
                    assert_eq!(aggregate.in_stock == aggregate.total, aggregate.total == 3);

                    let page = reader.scan(&BookQuery::default()).unwrap();
                    assert!(page.total == 3 || page.total == 40);

                    let current = reader.current_snapshot().unwrap().unwrap();
                    assert!(current.book_count == 3 || current.book_count == 40);

                    observations += 1;
                    if finished {
                        break;
                    }
                }
                observations
            })
        };

        for round in 0..20 {
            let batch = if round % 2 == 0 { &large } else { &small };
            writer.replace_all(batch, "swap").unwrap();
        }
        done.store(true, Ordering::SeqCst);

        let observations = reader.join().unwrap();
        assert!(observations > 0);
    }
}
