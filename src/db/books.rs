//! Book metadata records.

use crate::types::{BookId, BookSummary};
use crate::{Error, Result};

use super::{BookRecord, BookRow, Database};

impl Database {
    /// Insert or replace a book record
    pub async fn save_book(&self, book: &BookRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO books (
                book_id, title, isbn, metadata, file_count,
                cached_file_count, complete, cached_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(book.book_id.as_str())
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(&book.metadata)
        .bind(book.file_count as i64)
        .bind(book.cached_file_count as i64)
        .bind(book.complete as i64)
        .bind(book.cached_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(())
    }

    /// Look up a book by id
    pub async fn get_book(&self, book_id: &BookId) -> Result<Option<BookRecord>> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT book_id, title, isbn, metadata, file_count,
                   cached_file_count, complete, cached_at
            FROM books
            WHERE book_id = ?
            "#,
        )
        .bind(book_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(row.map(BookRecord::from))
    }

    /// List all cached books as summaries (no metadata blob)
    pub async fn list_books(&self) -> Result<Vec<BookSummary>> {
        let rows = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT book_id, title, isbn, metadata, file_count,
                   cached_file_count, complete, cached_at
            FROM books
            ORDER BY cached_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(BookSummary::from).collect())
    }

    /// Delete a book together with every cached file sharing its id
    ///
    /// Both deletes run in a single transaction: either the book and all its
    /// files are gone, or nothing changed.
    pub async fn delete_book(&self, book_id: &BookId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Sqlx)?;

        sqlx::query("DELETE FROM files WHERE book_id = ?")
            .bind(book_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Error::Sqlx)?;

        sqlx::query("DELETE FROM books WHERE book_id = ?")
            .bind(book_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Error::Sqlx)?;

        tx.commit().await.map_err(Error::Sqlx)?;
        Ok(())
    }
}
