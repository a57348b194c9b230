//! # epub-dl
//!
//! Library for downloading books from a remote content API and assembling
//! them into valid EPUB archives.
//!
//! ## Design Philosophy
//!
//! epub-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Resilient** - Per-request retries with backoff; one failed file never
//!   fails a whole download
//! - **Cache-backed** - Previously downloaded files are served from a local
//!   SQLite cache
//! - **Event-driven** - Consumers subscribe to progress events, no polling
//!   required
//!
//! ## Quick Start
//!
//! ```no_run
//! use epub_dl::{BookId, Config, DownloadOptions, DownloadRequest, EpubDownloader};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = EpubDownloader::new(Config::default()).await?;
//!
//!     // Subscribe to progress events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let outcome = downloader
//!         .download_book(
//!             DownloadRequest {
//!                 book_id: BookId::new("urn:orm:book:9781491927281"),
//!                 auth_token: "token".to_string(),
//!                 options: DownloadOptions::default(),
//!             },
//!             CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     std::fs::write(&outcome.filename, &outcome.archive)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Remote content API client
pub mod api;
/// EPUB archive assembly
pub mod archive;
/// Configuration types
pub mod config;
/// SQLite content cache
pub mod db;
/// Download orchestration (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// HTTP fetching with retries
pub mod fetch;
/// Bounded-concurrency task pool
pub mod pool;
/// Markup cleanup and reference rewriting
pub mod transform;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadOptions, RetryConfig};
pub use db::{BookRecord, Database, FileRecord};
pub use downloader::{DownloadRequest, EpubDownloader};
pub use error::{ArchiveError, DatabaseError, Error, Result};
pub use types::{
    BookId, BookMetadata, BookSummary, DownloadOutcome, Event, FailedFile, FileBody, HistoryEntry,
    ManifestEntry, Stage,
};
