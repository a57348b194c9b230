//! Download orchestration
//!
//! [`EpubDownloader`] composes the fetcher, concurrency pool, content cache,
//! markup transformer, and archive builder into the end-to-end pipeline, and
//! exposes the cache management surface (list/delete/clear/history).
//!
//! The pipeline itself lives in `download_task`; this module holds the
//! downloader struct, construction, and the small management operations.

mod download_task;


pub use download_task::DownloadRequest;

use crate::api::ApiClient;
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::types::{BookId, BookSummary, Event, HistoryEntry, Stage};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Main downloader instance (cloneable - all fields are Arc-wrapped or cheap)
#[derive(Clone)]
pub struct EpubDownloader {
    /// Content cache for book metadata and resource files
    ///
    /// Public for integration tests to inspect cached state.
    pub db: Arc<Database>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Remote content API client
    pub(crate) api: ApiClient,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl EpubDownloader {
    /// Create a new downloader, opening (or creating) the content cache
    pub async fn new(config: Config) -> Result<Self> {
        let db = Arc::new(Database::new(&config.cache_path).await?);
        let fetcher = Fetcher::new(config.retry.clone());
        let api = ApiClient::new(&config, fetcher)?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            db,
            config: Arc::new(config),
            api,
            event_tx,
        })
    }

    /// Subscribe to progress and completion events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// List all cached books (summary projection only)
    pub async fn list_cached_books(&self) -> Result<Vec<BookSummary>> {
        self.db.list_books().await
    }

    /// Delete a cached book together with all its cached files
    pub async fn delete_cached_book(&self, book_id: &BookId) -> Result<()> {
        tracing::info!(%book_id, "deleting cached book");
        self.db.delete_book(book_id).await
    }

    /// Drop the entire cache, including history
    pub async fn clear_cache(&self) -> Result<()> {
        tracing::info!("clearing content cache");
        self.db.clear().await
    }

    /// Download history, most recent first
    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.db.history().await
    }

    /// Close the underlying cache handle
    pub async fn close(&self) {
        self.db.close().await;
    }

    /// Emit a progress event; delivery is best-effort
    pub(crate) fn progress(&self, stage: Stage, percent: u8, message: impl Into<String>) {
        // A send error just means nobody is listening
        let _ = self.event_tx.send(Event::Progress {
            stage,
            percent,
            message: message.into(),
        });
    }

    /// Emit any event; delivery is best-effort
    pub(crate) fn emit(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }
}
