//! The end-to-end download pipeline
//!
//! One call to [`EpubDownloader::download_book`] runs the whole sequence:
//! metadata, manifest, cache diff, parallel fetch with transform, archive
//! assembly, and history. Progress is broadcast as [`Event`]s, and a
//! [`CancellationToken`] aborts the run at every suspension point.

use super::EpubDownloader;
use crate::archive::{
    ArchiveBuilder, CONTAINER_PATH, DISPLAY_OPTIONS_PATH, container_xml, display_options_entry,
    mimetype_entry,
};
use crate::config::DownloadOptions;
use crate::db::{BookRecord, FileRecord};
use crate::error::{Error, Result};
use crate::pool::ConcurrencyPool;
use crate::transform::{clean_markup, is_transformable};
use crate::types::{
    ArchiveEntry, BookId, BookMetadata, DownloadOutcome, Event, FailedFile, FileBody,
    HistoryEntry, ManifestEntry, PACKAGE_DESCRIPTOR_TYPE, Stage,
};
use crate::utils::sanitize_filename;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// One download request
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Identifier of the book to download
    pub book_id: BookId,
    /// Bearer token sent with every remote request
    pub auth_token: String,
    /// Cache behavior for this run
    pub options: DownloadOptions,
}

impl EpubDownloader {
    /// Download a book end to end and return the assembled archive
    ///
    /// Emits [`Event::Progress`] throughout, then exactly one terminal
    /// [`Event::Completed`] or [`Event::Failed`]. Individual file failures do
    /// not fail the run; they are reported in
    /// [`DownloadOutcome::failed_files`].
    pub async fn download_book(
        &self,
        request: DownloadRequest,
        cancel: CancellationToken,
    ) -> Result<DownloadOutcome> {
        let mut stage = Stage::Idle;
        let result = self.run_pipeline(&request, &cancel, &mut stage).await;

        match &result {
            Ok(outcome) => {
                info!(
                    book_id = %request.book_id,
                    filename = %outcome.filename,
                    failed = outcome.failed_files.len(),
                    from_cache = outcome.from_cache,
                    "download complete"
                );
                self.emit(Event::Completed {
                    filename: outcome.filename.clone(),
                    failed: outcome.failed_files.len(),
                    from_cache: outcome.from_cache,
                });
            }
            Err(error) => {
                tracing::error!(book_id = %request.book_id, ?stage, %error, "download failed");
                self.emit(Event::Failed {
                    stage,
                    error: error.to_string(),
                });
            }
        }

        result
    }

    async fn run_pipeline(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
        stage: &mut Stage,
    ) -> Result<DownloadOutcome> {
        let options = &request.options;

        // Metadata: cached copy first unless a refresh was forced
        *stage = Stage::MetadataResolving;
        ensure_active(cancel)?;
        let (metadata, raw_metadata) = self
            .resolve_metadata(&request.book_id, &request.auth_token, options)
            .await?;

        // Cache keys and reference rewriting use the canonical URN when the
        // metadata carries one, so requests by alias land on the same record
        let book_id = metadata
            .ourn
            .clone()
            .map(BookId::new)
            .unwrap_or_else(|| request.book_id.clone());

        self.db
            .save_book(&BookRecord {
                book_id: book_id.clone(),
                title: metadata.title.clone(),
                isbn: metadata.isbn.clone(),
                metadata: raw_metadata.clone(),
                file_count: 0,
                cached_file_count: 0,
                complete: false,
                cached_at: Utc::now(),
            })
            .await?;

        // Manifest
        *stage = Stage::ManifestListing;
        ensure_active(cancel)?;
        self.progress(Stage::ManifestListing, 10, "Getting file list...");
        let manifest = self
            .api
            .collect_manifest(&metadata.files, &request.auth_token)
            .await?;

        // Cache diff
        *stage = Stage::CacheDiffing;
        ensure_active(cancel)?;
        let (cached, to_fetch) = self.partition_cached(&book_id, &manifest, options).await?;
        let from_cache = cached.len();
        self.progress(
            Stage::CacheDiffing,
            15,
            format!("Found {from_cache}/{} files in cache", manifest.len()),
        );

        // Parallel fetch
        *stage = Stage::Fetching;
        self.progress(
            Stage::Fetching,
            20,
            format!("Downloading {} files...", to_fetch.len()),
        );
        let (mut output, failed_files) = self
            .fetch_files(&book_id, &to_fetch, request, cancel, manifest.len(), from_cache)
            .await;
        // A cancelled fetch pass aborts the run instead of assembling an
        // archive full of cancellation failures
        ensure_active(cancel)?;

        // Merge cached entries the fetch pass did not produce
        self.merge_cached(&book_id, &cached, &mut output).await?;
        output.insert(
            DISPLAY_OPTIONS_PATH.to_string(),
            display_options_entry(),
        );

        // Book counters reflect this run
        let fetched_ok = to_fetch.len() - failed_files.len();
        self.db
            .save_book(&BookRecord {
                book_id: book_id.clone(),
                title: metadata.title.clone(),
                isbn: metadata.isbn.clone(),
                metadata: raw_metadata,
                file_count: manifest.len() as u32,
                cached_file_count: (from_cache + fetched_ok) as u32,
                complete: failed_files.is_empty(),
                cached_at: Utc::now(),
            })
            .await?;

        // Assemble
        *stage = Stage::Assembling;
        ensure_active(cancel)?;
        self.progress(Stage::Assembling, 90, "Building EPUB file...");
        let entries = ordered_entries(output, &manifest)?;
        let archive = ArchiveBuilder::build(&entries)?;

        // History; a failure here never fails a finished download
        *stage = Stage::Persisting;
        self.progress(Stage::Persisting, 95, "Saving file...");
        let filename = output_filename(&metadata, &book_id);
        let history = HistoryEntry {
            book_id: book_id.clone(),
            title: metadata.title.clone(),
            isbn: metadata.isbn.clone(),
            downloaded_at: Utc::now(),
            filename: filename.clone(),
            failed_count: failed_files.len() as u32,
        };
        if let Err(error) = self.db.record_history(&history, self.config.history_limit).await {
            warn!(book_id = %book_id, %error, "failed to record download history");
        }

        self.progress(Stage::Completed, 100, "Download complete!");
        *stage = Stage::Completed;

        Ok(DownloadOutcome {
            filename,
            archive,
            failed_files,
            from_cache,
        })
    }

    /// Book metadata plus the raw JSON string it came from
    async fn resolve_metadata(
        &self,
        id: &BookId,
        token: &str,
        options: &DownloadOptions,
    ) -> Result<(BookMetadata, String)> {
        if options.use_cache && !options.force_refresh {
            if let Some(book) = self.db.get_book(id).await? {
                match serde_json::from_str::<BookMetadata>(&book.metadata) {
                    Ok(metadata) => {
                        self.progress(Stage::MetadataResolving, 5, "Using cached metadata...");
                        return Ok((metadata, book.metadata));
                    }
                    Err(error) => {
                        // Unreadable cached metadata falls through to a fresh fetch
                        warn!(book_id = %id, %error, "cached metadata unreadable, refetching");
                    }
                }
            }
        }

        self.progress(Stage::MetadataResolving, 0, "Fetching book metadata...");
        let (metadata, raw) = self.api.get_metadata(id, token).await?;
        Ok((metadata, raw.to_string()))
    }

    /// Split the manifest into cache hits and entries that need fetching
    async fn partition_cached(
        &self,
        book_id: &BookId,
        manifest: &[ManifestEntry],
        options: &DownloadOptions,
    ) -> Result<(Vec<ManifestEntry>, Vec<ManifestEntry>)> {
        if !options.use_cache || options.force_refresh {
            return Ok((Vec::new(), manifest.to_vec()));
        }

        let cached_paths = self.db.cached_paths(book_id).await?;
        if cached_paths.is_empty() {
            return Ok((Vec::new(), manifest.to_vec()));
        }

        Ok(manifest
            .iter()
            .cloned()
            .partition(|entry| cached_paths.contains(&entry.full_path)))
    }

    /// Fetch, transform, and cache every entry in `to_fetch`
    ///
    /// Returns the produced archive entries keyed by archive path (seeded
    /// with the `mimetype` entry) and the per-file failures. Cache writes are
    /// detached; a lost write costs a refetch next run, nothing more.
    async fn fetch_files(
        &self,
        book_id: &BookId,
        to_fetch: &[ManifestEntry],
        request: &DownloadRequest,
        cancel: &CancellationToken,
        total: usize,
        from_cache: usize,
    ) -> (HashMap<String, ArchiveEntry>, Vec<FailedFile>) {
        let mut output = HashMap::new();
        output.insert("mimetype".to_string(), mimetype_entry());
        let mut failed_files = Vec::new();

        if to_fetch.is_empty() {
            return (output, failed_files);
        }

        let tasks: Vec<_> = to_fetch
            .iter()
            .map(|entry| {
                let api = self.api.clone();
                let token = request.auth_token.clone();
                let entry = entry.clone();
                move || async move {
                    let body = api.fetch_file(&entry.url, &token).await?;
                    Ok::<_, Error>((entry, body))
                }
            })
            .collect();

        let pool = ConcurrencyPool::new(self.config.concurrency, self.config.stagger);
        let mut completed = from_cache;

        pool.run(tasks, cancel.clone(), |outcome| {
            completed += 1;
            let percent = 20 + ((completed as f64 / total as f64) * 70.0).round() as u8;

            match outcome.result {
                Ok((entry, body)) => {
                    let body = self.transform_body(book_id, &entry, body);
                    self.cache_file_detached(book_id, &entry, &body);

                    let archive_path = format!("OEBPS/{}", entry.full_path);
                    if entry.media_type == PACKAGE_DESCRIPTOR_TYPE {
                        output.insert(
                            CONTAINER_PATH.to_string(),
                            container_entry(&archive_path),
                        );
                    }
                    output.insert(
                        archive_path.clone(),
                        ArchiveEntry::new(archive_path, body, entry.media_type),
                    );
                }
                Err(error) => {
                    let path = to_fetch[outcome.index].full_path.clone();
                    warn!(book_id = %book_id, %path, %error, "file download failed");
                    failed_files.push(FailedFile {
                        path,
                        error: error.to_string(),
                    });
                }
            }

            self.progress(
                Stage::Fetching,
                percent,
                format!(
                    "Downloaded {completed}/{total} files ({} failed)",
                    failed_files.len()
                ),
            );
        })
        .await;

        (output, failed_files)
    }

    /// Rewrite markup bodies so their references resolve inside the archive
    fn transform_body(&self, book_id: &BookId, entry: &ManifestEntry, body: FileBody) -> FileBody {
        match body {
            FileBody::Text(text) if is_transformable(&entry.media_type) => {
                FileBody::Text(clean_markup(&text, book_id, &entry.full_path))
            }
            other => other,
        }
    }

    /// Detached best-effort cache write
    fn cache_file_detached(&self, book_id: &BookId, entry: &ManifestEntry, body: &FileBody) {
        let db = Arc::clone(&self.db);
        let record = FileRecord {
            book_id: book_id.clone(),
            path: entry.full_path.clone(),
            body: body.clone(),
            media_type: entry.media_type.clone(),
            kind: entry.kind.clone(),
            cached_at: Utc::now(),
        };
        tokio::spawn(async move {
            if let Err(error) = db.save_file(&record).await {
                warn!(book_id = %record.book_id, path = %record.path, %error, "cache write failed");
            }
        });
    }

    /// Pull cache hits into the output map
    ///
    /// Fetched entries win on path collision; a cached package descriptor
    /// synthesizes the container entry when none was produced yet.
    async fn merge_cached(
        &self,
        book_id: &BookId,
        cached: &[ManifestEntry],
        output: &mut HashMap<String, ArchiveEntry>,
    ) -> Result<()> {
        if cached.is_empty() {
            return Ok(());
        }

        let mut records: HashMap<String, FileRecord> = self
            .db
            .files_for_book(book_id)
            .await?
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();

        for entry in cached {
            let archive_path = format!("OEBPS/{}", entry.full_path);
            if output.contains_key(&archive_path) {
                continue;
            }
            let Some(record) = records.remove(&entry.full_path) else {
                // Raced with a delete between the diff and here
                warn!(book_id = %book_id, path = %entry.full_path, "cached file vanished");
                continue;
            };
            if record.media_type == PACKAGE_DESCRIPTOR_TYPE
                && !output.contains_key(CONTAINER_PATH)
            {
                output.insert(CONTAINER_PATH.to_string(), container_entry(&archive_path));
            }
            output.insert(
                archive_path.clone(),
                ArchiveEntry::new(archive_path, record.body, record.media_type),
            );
        }

        Ok(())
    }
}

/// Return an error when the token is already cancelled
fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// The `META-INF/container.xml` entry pointing at the package descriptor
fn container_entry(opf_archive_path: &str) -> ArchiveEntry {
    ArchiveEntry::new(
        CONTAINER_PATH,
        FileBody::Text(container_xml(opf_archive_path)),
        "application/xml",
    )
}

/// Deterministic archive order: mimetype, container, manifest-ordered
/// content, then the display options entry
fn ordered_entries(
    mut output: HashMap<String, ArchiveEntry>,
    manifest: &[ManifestEntry],
) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::with_capacity(output.len());

    let mimetype = output
        .remove("mimetype")
        .ok_or_else(|| Error::Other("mimetype entry missing from output".to_string()))?;
    entries.push(mimetype);

    if let Some(container) = output.remove(CONTAINER_PATH) {
        entries.push(container);
    }
    for entry in manifest {
        if let Some(produced) = output.remove(&format!("OEBPS/{}", entry.full_path)) {
            entries.push(produced);
        }
    }
    if let Some(display_options) = output.remove(DISPLAY_OPTIONS_PATH) {
        entries.push(display_options);
    }

    Ok(entries)
}

/// Sanitized output filename, `{title}-{isbn}.epub`
fn output_filename(metadata: &BookMetadata, book_id: &BookId) -> String {
    let suffix = metadata.isbn.as_deref().unwrap_or(book_id.as_str());
    sanitize_filename(&format!("{}-{}.epub", metadata.title, suffix))
}
