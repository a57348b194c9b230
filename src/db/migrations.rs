//! Cache lifecycle: open, close, clear, and versioned schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

impl Database {
    /// Open (or create) the cache database at `path` and migrate its schema
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // WAL keeps detached cache writes from blocking readers
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Close the database, invalidating the pooled handle
    ///
    /// The next [`Database::new`] call reopens the store.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Drop and recreate every collection, discarding all cached content
    pub async fn clear(&self) -> Result<()> {
        for table in ["files", "books", "history", "schema_version"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "failed to drop {}: {}",
                        table, e
                    )))
                })?;
        }
        self.run_migrations().await
    }

    /// Bring the schema up to the current version
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "failed to create schema_version table: {}",
                e
            )))
        })?;

        // MAX(version) over an empty table is a NULL scalar, hence the
        // nested Option
        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        let current_version = current_version.unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// v1: books, files, and history tables
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("applying cache schema migration v1");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                book_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                isbn TEXT,
                metadata TEXT NOT NULL,
                file_count INTEGER NOT NULL DEFAULT 0,
                cached_file_count INTEGER NOT NULL DEFAULT 0,
                complete INTEGER NOT NULL DEFAULT 0,
                cached_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "failed to create books table: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                book_id TEXT NOT NULL,
                path TEXT NOT NULL,
                content BLOB NOT NULL,
                is_text INTEGER NOT NULL,
                media_type TEXT NOT NULL,
                kind TEXT,
                cached_at INTEGER NOT NULL,
                PRIMARY KEY (book_id, path)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "failed to create files table: {}",
                e
            )))
        })?;

        // Secondary lookup: all files for a book
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_book ON files (book_id)")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "failed to create files index: {}",
                    e
                )))
            })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id TEXT NOT NULL,
                title TEXT NOT NULL,
                isbn TEXT,
                filename TEXT NOT NULL,
                failed_count INTEGER NOT NULL DEFAULT 0,
                downloaded_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "failed to create history table: {}",
                e
            )))
        })?;

        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (1, ?)")
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "failed to record migration v1: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
