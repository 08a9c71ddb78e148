//! In-memory snapshot store
//!
//! Holds the current generation behind an `Arc` that is swapped under a
//! write lock. Readers clone the `Arc` and work on it without holding the
//! lock, so a replace never shows them a half-built set. Useful for tests
//! and for embedding the crawler where persistence is not wanted.

use crate::book::Book;
use crate::storage::traits::{SnapshotStore, StorageError, StorageResult};
use crate::storage::{
    BookFilter, BookPage, BookQuery, SnapshotAggregate, SnapshotInfo, SortField, SortOrder,
};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Debug)]
struct Generation {
    info: SnapshotInfo,
    books: Vec<Book>,
    by_id: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct Slot {
    current: Option<Arc<Generation>>,
    last_id: i64,
}

/// Snapshot store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: RwLock<Slot>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> StorageResult<Option<Arc<Generation>>> {
        let slot = self.slot.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(slot.current.clone())
    }

    fn matching<'a>(
        generation: &'a Generation,
        filter: &'a BookFilter,
    ) -> impl Iterator<Item = &'a Book> {
        generation.books.iter().filter(move |book| filter.matches(book))
    }
}

impl SnapshotStore for MemoryStorage {
    fn replace_all(&self, books: &[Book], config_hash: &str) -> StorageResult<SnapshotInfo> {
        let mut seen = HashSet::with_capacity(books.len());
        for book in books {
            if !seen.insert(book.detail_url.as_str()) {
                return Err(StorageError::ConstraintViolation(format!(
                    "duplicate detail URL in batch: {}",
                    book.detail_url
                )));
            }
        }

        let by_id = books
            .iter()
            .enumerate()
            .map(|(position, book)| (book.id.clone(), position))
            .collect();

        let mut slot = self.slot.write().map_err(|_| StorageError::LockPoisoned)?;
        slot.last_id += 1;
        let info = SnapshotInfo {
            id: slot.last_id,
            created_at: Utc::now(),
            book_count: books.len() as u64,
            config_hash: config_hash.to_string(),
        };
        slot.current = Some(Arc::new(Generation {
            info: info.clone(),
            books: books.to_vec(),
            by_id,
        }));

        Ok(info)
    }

    fn current_snapshot(&self) -> StorageResult<Option<SnapshotInfo>> {
        Ok(self.current()?.map(|generation| generation.info.clone()))
    }

    fn find_by_id(&self, id: &str) -> StorageResult<Option<Book>> {
        Ok(self.current()?.and_then(|generation| {
            generation
                .by_id
                .get(id)
                .map(|&position| generation.books[position].clone())
        }))
    }

    fn find_by_detail_url(&self, detail_url: &str) -> StorageResult<Option<Book>> {
        Ok(self.current()?.and_then(|generation| {
            generation
                .books
                .iter()
                .find(|book| book.detail_url == detail_url)
                .cloned()
        }))
    }

    fn count(&self, filter: &BookFilter) -> StorageResult<u64> {
        Ok(self
            .current()?
            .map(|generation| Self::matching(&generation, filter).count() as u64)
            .unwrap_or(0))
    }

    fn scan(&self, query: &BookQuery) -> StorageResult<BookPage> {
        let Some(generation) = self.current()? else {
            return Ok(BookPage::new(Vec::new(), 0, query));
        };

        // Stable sort: ties keep catalog order
        let mut matching: Vec<&Book> = Self::matching(&generation, &query.filter).collect();
        matching.sort_by(|a, b| {
            let ordering = compare(a, b, query.sort_by);
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matching.len() as u64;
        let books = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect();

        Ok(BookPage::new(books, total, query))
    }

    fn aggregate(&self) -> StorageResult<SnapshotAggregate> {
        Ok(self
            .current()?
            .map(|generation| SnapshotAggregate::from_books(&generation.books))
            .unwrap_or_default())
    }
}

fn compare(a: &Book, b: &Book, field: SortField) -> Ordering {
    match field {
        SortField::Title => a.title.cmp(&b.title),
        SortField::Price => a.price.total_cmp(&b.price),
        SortField::Rating => a.rating.cmp(&b.rating),
        SortField::ScrapedAt => a.scraped_at.cmp(&b.scraped_at),
    }
}
