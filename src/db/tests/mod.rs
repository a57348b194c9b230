//! Database tests, organized by domain.

mod files;
mod history;

use super::*;
use tempfile::NamedTempFile;

/// Open a fresh database backed by a temp file
///
/// The returned guard keeps the file alive for the test's duration.
pub(super) async fn test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

pub(super) fn sample_book(id: &str, title: &str) -> BookRecord {
    BookRecord {
        book_id: BookId::new(id),
        title: title.to_string(),
        isbn: Some("9781492051".to_string()),
        metadata: r#"{"title":"T","files":"https://x/files/"}"#.to_string(),
        file_count: 0,
        cached_file_count: 0,
        complete: false,
        cached_at: chrono::Utc::now(),
    }
}

pub(super) fn sample_file(id: &str, path: &str, body: FileBody) -> FileRecord {
    FileRecord {
        book_id: BookId::new(id),
        path: path.to_string(),
        body,
        media_type: "text/html".to_string(),
        kind: Some("chapter".to_string()),
        cached_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn clear_drops_and_recreates_collections() {
    let (db, _guard) = test_db().await;

    db.save_book(&sample_book("urn:orm:book:1", "Book One"))
        .await
        .unwrap();
    db.save_file(&sample_file(
        "urn:orm:book:1",
        "ch1.html",
        FileBody::Text("<html/>".to_string()),
    ))
    .await
    .unwrap();

    db.clear().await.unwrap();

    assert!(db.list_books().await.unwrap().is_empty());
    assert!(
        db.cached_paths(&BookId::new("urn:orm:book:1"))
            .await
            .unwrap()
            .is_empty()
    );

    // Recreated schema accepts new writes
    db.save_book(&sample_book("urn:orm:book:2", "Book Two"))
        .await
        .unwrap();
    assert_eq!(db.list_books().await.unwrap().len(), 1);

    db.close().await;
}

#[tokio::test]
async fn reopening_the_same_file_sees_persisted_state() {
    let temp_file = NamedTempFile::new().unwrap();

    let db = Database::new(temp_file.path()).await.unwrap();
    db.save_book(&sample_book("urn:orm:book:1", "Persisted"))
        .await
        .unwrap();
    db.close().await;

    let db = Database::new(temp_file.path()).await.unwrap();
    let book = db
        .get_book(&BookId::new("urn:orm:book:1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(book.title, "Persisted");
    db.close().await;
}
