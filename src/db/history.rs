//! Capped, deduplicated download history.

use crate::types::HistoryEntry;
use crate::{Error, Result};

use super::{Database, HistoryRow};

impl Database {
    /// Record a completed download in history
    ///
    /// Runs in one transaction: any prior entry for the same book is replaced
    /// by the new one, and the list is trimmed to `limit` entries, dropping
    /// the oldest.
    pub async fn record_history(&self, entry: &HistoryEntry, limit: usize) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Sqlx)?;

        sqlx::query("DELETE FROM history WHERE book_id = ?")
            .bind(entry.book_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Error::Sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO history (book_id, title, isbn, filename, failed_count, downloaded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.book_id.as_str())
        .bind(&entry.title)
        .bind(&entry.isbn)
        .bind(&entry.filename)
        .bind(entry.failed_count as i64)
        .bind(entry.downloaded_at.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(Error::Sqlx)?;

        sqlx::query(
            r#"
            DELETE FROM history
            WHERE id NOT IN (
                SELECT id FROM history
                ORDER BY downloaded_at DESC, id DESC
                LIMIT ?
            )
            "#,
        )
        .bind(limit as i64)
        .execute(&mut *tx)
        .await
        .map_err(Error::Sqlx)?;

        tx.commit().await.map_err(Error::Sqlx)?;
        Ok(())
    }

    /// Download history, most recent first
    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT book_id, title, isbn, filename, failed_count, downloaded_at
            FROM history
            ORDER BY downloaded_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }
}
