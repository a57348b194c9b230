//! Core types for epub-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media type of the EPUB package descriptor (the `.opf` file)
pub const PACKAGE_DESCRIPTOR_TYPE: &str = "application/oebps-package+xml";

/// Stable identifier of a remote book (an ORM URN or ISBN)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub String);

impl BookId {
    /// Create a new BookId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `:article:` variant of a `:book:` URN, if this is one
    ///
    /// Some documents are registered under the article resource kind; when the
    /// primary metadata lookup fails, the orchestrator retries once with this
    /// variant before giving up.
    pub fn article_variant(&self) -> Option<BookId> {
        if self.0.contains(":book:") {
            Some(BookId(self.0.replace(":book:", ":article:")))
        } else {
            None
        }
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BookId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BookId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Fetched or cached resource content, preserving the text/binary distinction
///
/// Textual resources (HTML, XML, CSS, JSON) are kept as strings so the markup
/// transformer can rewrite them; everything else stays raw bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileBody {
    /// Decoded text content
    Text(String),
    /// Raw binary content
    Binary(Vec<u8>),
}

impl FileBody {
    /// Content as bytes, regardless of variant
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileBody::Text(s) => s.as_bytes(),
            FileBody::Binary(b) => b,
        }
    }

    /// Content as text, if textual
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileBody::Text(s) => Some(s),
            FileBody::Binary(_) => None,
        }
    }

    /// Content length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// True if the content is empty
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// One entry of the book manifest, as returned by the paginated files listing
///
/// Transient: produced by the collector, consumed by the orchestrator, never
/// persisted.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path of the resource relative to the book root
    pub full_path: String,
    /// Absolute URL the resource content is served from
    pub url: String,
    /// Resource media type (e.g. `application/xhtml+xml`, `image/jpeg`)
    pub media_type: String,
    /// Resource kind label from the listing (e.g. `chapter`, `image`)
    #[serde(default)]
    pub kind: Option<String>,
}

/// One page of the paginated files listing
#[derive(Clone, Debug, Deserialize)]
pub struct ManifestPage {
    /// Entries on this page
    pub results: Vec<ManifestEntry>,
    /// URL of the next page, absent on the final page
    #[serde(default)]
    pub next: Option<String>,
}

/// Book metadata returned by the metadata endpoint
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BookMetadata {
    /// Book title
    pub title: String,
    /// ISBN, when the book has one
    #[serde(default)]
    pub isbn: Option<String>,
    /// Canonical URN of the book (may differ from the id used to look it up)
    #[serde(default)]
    pub ourn: Option<String>,
    /// URL of the first page of the paginated files listing
    pub files: String,
}

/// One entry of the assembled archive, in final emit order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive (e.g. `mimetype`, `OEBPS/chapter1.html`)
    pub path: String,
    /// Entry content; the builder never alters these bytes
    pub body: FileBody,
    /// Entry media type
    pub media_type: String,
    /// Store the entry without compression instead of deflating it
    pub store_uncompressed: bool,
}

impl ArchiveEntry {
    /// Compressed entry with the given path, body and media type
    pub fn new(path: impl Into<String>, body: FileBody, media_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            body,
            media_type: media_type.into(),
            store_uncompressed: false,
        }
    }

    /// Uncompressed (stored) entry
    pub fn stored(path: impl Into<String>, body: FileBody, media_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            body,
            media_type: media_type.into(),
            store_uncompressed: true,
        }
    }
}

/// A file that failed to download after all retries
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct FailedFile {
    /// Manifest path of the failed file
    pub path: String,
    /// Error message from the last attempt
    pub error: String,
}

/// Final result of a successful download run
///
/// Per-file failures are non-fatal; a run with failed files still produces an
/// archive containing everything that did download, and the caller can present
/// a partial-success summary from `failed_files`.
#[derive(Clone, Debug)]
pub struct DownloadOutcome {
    /// Sanitized output filename (`{title}-{isbn}.epub`)
    pub filename: String,
    /// The assembled EPUB archive bytes
    pub archive: Vec<u8>,
    /// Files that failed to download after all retries
    pub failed_files: Vec<FailedFile>,
    /// Number of manifest files served from the local cache
    pub from_cache: usize,
}

/// Pipeline stage of a download run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Not started
    Idle,
    /// Resolving book metadata (cache or remote)
    MetadataResolving,
    /// Walking the paginated files listing
    ManifestListing,
    /// Diffing the manifest against the cache
    CacheDiffing,
    /// Downloading files through the concurrency pool
    Fetching,
    /// Assembling the archive
    Assembling,
    /// Saving history and final book counters
    Persisting,
    /// Run finished
    Completed,
    /// Run aborted with a fatal error
    Failed,
}

/// Events emitted by [`EpubDownloader`](crate::EpubDownloader)
///
/// Delivery is best-effort over a broadcast channel; a run proceeds normally
/// with zero subscribers.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Progress update at a pipeline milestone
    Progress {
        /// Current pipeline stage
        stage: Stage,
        /// Progress percentage, 0-100
        percent: u8,
        /// Human-readable status message
        message: String,
    },
    /// Run completed (possibly with per-file failures)
    Completed {
        /// Output filename
        filename: String,
        /// Number of files that failed to download
        failed: usize,
        /// Number of files served from cache
        from_cache: usize,
    },
    /// Run aborted with a fatal error
    Failed {
        /// Stage the run failed in
        stage: Stage,
        /// Error message
        error: String,
    },
}

/// One download history record, most recent first
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Book identifier
    pub book_id: BookId,
    /// Book title
    pub title: String,
    /// ISBN, when known
    pub isbn: Option<String>,
    /// When the download completed
    pub downloaded_at: DateTime<Utc>,
    /// Output filename
    pub filename: String,
    /// Number of files that failed in that run
    pub failed_count: u32,
}

/// Summary projection of a cached book (no metadata blob)
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct BookSummary {
    /// Book identifier
    pub book_id: BookId,
    /// Book title
    pub title: String,
    /// ISBN, when known
    pub isbn: Option<String>,
    /// Total file count seen in the most recent run
    pub file_count: u32,
    /// Number of files held in the cache
    pub cached_file_count: u32,
    /// True iff the most recent run had zero failed files
    pub complete: bool,
    /// When the book record was last written
    pub cached_at: DateTime<Utc>,
}
