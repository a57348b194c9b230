//! Content cache for epub-dl
//!
//! Handles SQLite persistence for book metadata, cached resource files, and
//! download history.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - `migrations`: database lifecycle, schema migrations, clear
//! - `books`: book metadata records and the atomic book+files delete
//! - `files`: per-resource cache keyed by `(book_id, path)`
//! - `history`: capped, deduplicated download history

use crate::types::{BookId, BookSummary, FileBody, HistoryEntry};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::FromRow;
use sqlx::sqlite::SqlitePool;

mod books;
mod files;
mod history;
mod migrations;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// SQLite-backed content cache
///
/// The pooled handle is created once in [`Database::new`] and reused across
/// calls; [`Database::close`] invalidates it.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

/// Cached book record
#[derive(Debug, Clone)]
pub struct BookRecord {
    /// Book identifier
    pub book_id: BookId,
    /// Book title
    pub title: String,
    /// ISBN, when known
    pub isbn: Option<String>,
    /// Raw metadata JSON as returned by the remote API
    pub metadata: String,
    /// Total file count seen in the most recent run
    pub file_count: u32,
    /// Number of files held in the cache for this book
    pub cached_file_count: u32,
    /// True iff the most recent run had zero failed files
    pub complete: bool,
    /// When the record was last written
    pub cached_at: DateTime<Utc>,
}

/// Raw book row from SQLite
#[derive(Debug, Clone, FromRow)]
struct BookRow {
    book_id: String,
    title: String,
    isbn: Option<String>,
    metadata: String,
    file_count: i64,
    cached_file_count: i64,
    complete: i64,
    cached_at: i64,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        BookRecord {
            book_id: BookId::new(row.book_id),
            title: row.title,
            isbn: row.isbn,
            metadata: row.metadata,
            file_count: row.file_count as u32,
            cached_file_count: row.cached_file_count as u32,
            complete: row.complete != 0,
            cached_at: timestamp(row.cached_at),
        }
    }
}

impl From<BookRow> for BookSummary {
    fn from(row: BookRow) -> Self {
        BookSummary {
            book_id: BookId::new(row.book_id),
            title: row.title,
            isbn: row.isbn,
            file_count: row.file_count as u32,
            cached_file_count: row.cached_file_count as u32,
            complete: row.complete != 0,
            cached_at: timestamp(row.cached_at),
        }
    }
}

/// Cached resource file, keyed by `(book_id, path)`
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Book the resource belongs to
    pub book_id: BookId,
    /// Resource path relative to the book root
    pub path: String,
    /// Resource content, text or binary
    pub body: FileBody,
    /// Resource media type
    pub media_type: String,
    /// Resource kind label, when the listing provided one
    pub kind: Option<String>,
    /// When the resource was cached
    pub cached_at: DateTime<Utc>,
}

/// Raw file row from SQLite
#[derive(Debug, Clone, FromRow)]
struct FileRow {
    book_id: String,
    path: String,
    content: Vec<u8>,
    is_text: i64,
    media_type: String,
    kind: Option<String>,
    cached_at: i64,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        let body = if row.is_text != 0 {
            FileBody::Text(String::from_utf8_lossy(&row.content).into_owned())
        } else {
            FileBody::Binary(row.content)
        };
        FileRecord {
            book_id: BookId::new(row.book_id),
            path: row.path,
            body,
            media_type: row.media_type,
            kind: row.kind,
            cached_at: timestamp(row.cached_at),
        }
    }
}

/// Raw history row from SQLite
#[derive(Debug, Clone, FromRow)]
struct HistoryRow {
    book_id: String,
    title: String,
    isbn: Option<String>,
    filename: String,
    failed_count: i64,
    downloaded_at: i64,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        HistoryEntry {
            book_id: BookId::new(row.book_id),
            title: row.title,
            isbn: row.isbn,
            downloaded_at: timestamp(row.downloaded_at),
            filename: row.filename,
            failed_count: row.failed_count as u32,
        }
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}
