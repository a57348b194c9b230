//! Per-resource cache keyed by `(book_id, path)`.

use crate::types::{BookId, FileBody};
use crate::{Error, Result};
use std::collections::HashSet;

use super::{Database, FileRecord, FileRow};

impl Database {
    /// Insert or replace a cached resource file
    pub async fn save_file(&self, file: &FileRecord) -> Result<()> {
        let is_text = matches!(file.body, FileBody::Text(_));
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO files (
                book_id, path, content, is_text, media_type, kind, cached_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(file.book_id.as_str())
        .bind(&file.path)
        .bind(file.body.as_bytes())
        .bind(is_text as i64)
        .bind(&file.media_type)
        .bind(&file.kind)
        .bind(file.cached_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(())
    }

    /// Look up one cached resource by its compound key
    pub async fn get_file(&self, book_id: &BookId, path: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT book_id, path, content, is_text, media_type, kind, cached_at
            FROM files
            WHERE book_id = ? AND path = ?
            "#,
        )
        .bind(book_id.as_str())
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(row.map(FileRecord::from))
    }

    /// Set of cached resource paths for a book
    pub async fn cached_paths(&self, book_id: &BookId) -> Result<HashSet<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT path FROM files WHERE book_id = ?")
            .bind(book_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Sqlx)?;

        Ok(paths.into_iter().collect())
    }

    /// All cached resources for a book
    pub async fn files_for_book(&self, book_id: &BookId) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT book_id, path, content, is_text, media_type, kind, cached_at
            FROM files
            WHERE book_id = ?
            ORDER BY path
            "#,
        )
        .bind(book_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(FileRecord::from).collect())
    }
}
