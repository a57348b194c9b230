//! Full pipeline integration test against a mock content API
//!
//! Seeds one file into the cache, serves the rest through wiremock, and
//! checks the assembled archive entry-by-entry.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use epub_dl::{
    BookId, Config, DownloadOptions, DownloadRequest, EpubDownloader, FileBody, FileRecord,
    RetryConfig,
};
use std::io::{Cursor, Read};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOOK_ID: &str = "urn:orm:book:9781098116743";
const OPF_BODY: &str = r#"<?xml version="1.0"?><package version="3.0"/>"#;
const CACHED_CSS: &str = "body { margin: 0; }";

#[tokio::test]
async fn downloads_partially_cached_book() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/api/v2/epubs/{BOOK_ID}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Practical Pipelines",
            "isbn": "9781098116743",
            "ourn": BOOK_ID,
            "files": format!("{}/api/v2/epubs/{BOOK_ID}/files/", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/v2/epubs/{BOOK_ID}/files/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {
                    "full_path": "content.opf",
                    "url": format!("{}/content/content.opf", server.uri()),
                    "media_type": "application/oebps-package+xml",
                    "kind": "opf",
                },
                {
                    "full_path": "styles/main.css",
                    "url": format!("{}/content/styles/main.css", server.uri()),
                    "media_type": "text/css",
                    "kind": "stylesheet",
                },
                {
                    "full_path": "chapters/ch01.html",
                    "url": format!("{}/content/chapters/ch01.html", server.uri()),
                    "media_type": "application/xhtml+xml",
                    "kind": "chapter",
                },
            ],
            "next": null,
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The stylesheet is pre-cached, so only these two files may be fetched
    Mock::given(method("GET"))
        .and(path("/content/content.opf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/oebps-package+xml")
                .set_body_string(OPF_BODY),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/content/chapters/ch01.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xhtml+xml")
                .set_body_string(
                    r#"<html><script>track()</script><img src="images/fig1.png"></html>"#,
                ),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/content/styles/main.css"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = Config {
        api_base: server.uri(),
        cache_path: dir.path().join("cache.db"),
        concurrency: 4,
        stagger: Duration::ZERO,
        page_delay: Duration::ZERO,
        retry: RetryConfig {
            max_retries: 1,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        },
        history_limit: 100,
    };
    let downloader = EpubDownloader::new(config).await.unwrap();

    let book_id = BookId::new(BOOK_ID);
    downloader
        .db
        .save_file(&FileRecord {
            book_id: book_id.clone(),
            path: "styles/main.css".to_string(),
            body: FileBody::Text(CACHED_CSS.to_string()),
            media_type: "text/css".to_string(),
            kind: Some("stylesheet".to_string()),
            cached_at: Utc::now(),
        })
        .await
        .unwrap();

    let outcome = downloader
        .download_book(
            DownloadRequest {
                book_id: book_id.clone(),
                auth_token: "token".to_string(),
                options: DownloadOptions::default(),
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.from_cache, 1);
    assert!(outcome.failed_files.is_empty());
    assert_eq!(outcome.filename, "Practical Pipelines-9781098116743.epub");

    let mut zip = zip::ZipArchive::new(Cursor::new(outcome.archive)).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "mimetype",
            "META-INF/container.xml",
            "OEBPS/content.opf",
            "OEBPS/styles/main.css",
            "OEBPS/chapters/ch01.html",
            "META-INF/com.apple.ibooks.display-options.xml",
        ]
    );

    let mut read_entry = |name: &str| {
        let mut content = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut content).unwrap();
        content
    };

    assert_eq!(read_entry("mimetype"), "application/epub+zip");
    assert!(read_entry("META-INF/container.xml").contains(r#"full-path="OEBPS/content.opf""#));
    assert_eq!(read_entry("OEBPS/styles/main.css"), CACHED_CSS);

    // The chapter markup was transformed on the way through
    let chapter = read_entry("OEBPS/chapters/ch01.html");
    assert!(!chapter.contains("<script"));
    assert!(chapter.contains(r#"src="../images/fig1.png""#));
}
