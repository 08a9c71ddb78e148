//! Database schema definitions
//!
//! Every replace writes a fresh generation into `snapshots`/`books`. The
//! single row of `snapshot_pointer` names the generation readers see, so
//! swapping it is the only step that changes what is visible.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per stored generation
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    book_count INTEGER NOT NULL,
    config_hash TEXT NOT NULL
);

-- Books of every generation that still exists
CREATE TABLE IF NOT EXISTS books (
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),
    position INTEGER NOT NULL,
    id TEXT NOT NULL,
    title TEXT NOT NULL,
    price REAL NOT NULL CHECK (price >= 0),
    price_text TEXT NOT NULL,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 0 AND 5),
    rating_text TEXT NOT NULL,
    availability_text TEXT NOT NULL,
    in_stock INTEGER NOT NULL,
    image_url TEXT NOT NULL,
    detail_url TEXT NOT NULL,
    scraped_at TEXT NOT NULL,
    UNIQUE(snapshot_id, detail_url)
);

CREATE INDEX IF NOT EXISTS idx_books_snapshot_id ON books(snapshot_id, id);
CREATE INDEX IF NOT EXISTS idx_books_snapshot_position ON books(snapshot_id, position);

-- The current generation; at most one row
CREATE TABLE IF NOT EXISTS snapshot_pointer (
    slot INTEGER PRIMARY KEY CHECK (slot = 1),
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id)
);
"#;

/// SQL fragment selecting the current generation id
pub const CURRENT_SNAPSHOT: &str = "(SELECT snapshot_id FROM snapshot_pointer WHERE slot = 1)";

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
