use super::*;
use chrono::{Duration, Utc};

fn entry(id: &str, title: &str, downloaded_at: chrono::DateTime<Utc>) -> HistoryEntry {
    HistoryEntry {
        book_id: BookId::new(id),
        title: title.to_string(),
        isbn: None,
        downloaded_at,
        filename: format!("{title}.epub"),
        failed_count: 0,
    }
}

#[tokio::test]
async fn history_is_most_recent_first() {
    let (db, _guard) = test_db().await;
    let now = Utc::now();

    db.record_history(&entry("urn:orm:book:1", "Old", now - Duration::hours(2)), 100)
        .await
        .unwrap();
    db.record_history(&entry("urn:orm:book:2", "Mid", now - Duration::hours(1)), 100)
        .await
        .unwrap();
    db.record_history(&entry("urn:orm:book:3", "New", now), 100)
        .await
        .unwrap();

    let history = db.history().await.unwrap();
    let titles: Vec<_> = history.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(titles, ["New", "Mid", "Old"]);

    db.close().await;
}

#[tokio::test]
async fn repeated_book_id_appears_once_at_the_front() {
    let (db, _guard) = test_db().await;
    let now = Utc::now();

    db.record_history(&entry("urn:orm:book:1", "First Run", now - Duration::hours(1)), 100)
        .await
        .unwrap();
    db.record_history(&entry("urn:orm:book:2", "Other", now - Duration::minutes(30)), 100)
        .await
        .unwrap();
    db.record_history(&entry("urn:orm:book:1", "Second Run", now), 100)
        .await
        .unwrap();

    let history = db.history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].title, "Second Run");
    assert_eq!(history[0].book_id, BookId::new("urn:orm:book:1"));
    assert_eq!(history[1].title, "Other");

    db.close().await;
}

#[tokio::test]
async fn adding_the_101st_entry_leaves_exactly_100() {
    let (db, _guard) = test_db().await;
    let now = Utc::now();

    for i in 0..101i64 {
        db.record_history(
            &entry(
                &format!("urn:orm:book:{i}"),
                &format!("Book {i}"),
                now - Duration::minutes(101 - i),
            ),
            100,
        )
        .await
        .unwrap();
    }

    let history = db.history().await.unwrap();
    assert_eq!(history.len(), 100);
    // Most recent first; the oldest entry (Book 0) was dropped
    assert_eq!(history[0].title, "Book 100");
    assert!(history.iter().all(|h| h.title != "Book 0"));

    db.close().await;
}

#[tokio::test]
async fn failed_count_persists() {
    let (db, _guard) = test_db().await;

    let mut failed = entry("urn:orm:book:1", "Partial", Utc::now());
    failed.failed_count = 4;
    failed.isbn = Some("9781492051".to_string());
    db.record_history(&failed, 100).await.unwrap();

    let history = db.history().await.unwrap();
    assert_eq!(history[0].failed_count, 4);
    assert_eq!(history[0].isbn.as_deref(), Some("9781492051"));
    assert_eq!(history[0].filename, "Partial.epub");

    db.close().await;
}
