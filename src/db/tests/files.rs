use super::*;

#[tokio::test]
async fn text_file_round_trips_byte_identically() {
    let (db, _guard) = test_db().await;

    let content = "<html>\n<body>héllo — ünïcode</body>\n</html>";
    db.save_file(&sample_file(
        "urn:orm:book:1",
        "text/ch1.html",
        FileBody::Text(content.to_string()),
    ))
    .await
    .unwrap();

    let restored = db
        .get_file(&BookId::new("urn:orm:book:1"), "text/ch1.html")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.body, FileBody::Text(content.to_string()));
    assert_eq!(restored.body.as_bytes(), content.as_bytes());
    assert_eq!(restored.media_type, "text/html");
    assert_eq!(restored.kind.as_deref(), Some("chapter"));

    db.close().await;
}

#[tokio::test]
async fn binary_file_round_trips_byte_identically() {
    let (db, _guard) = test_db().await;

    let payload: Vec<u8> = (0..=255).collect();
    let mut file = sample_file(
        "urn:orm:book:1",
        "images/fig1.png",
        FileBody::Binary(payload.clone()),
    );
    file.media_type = "image/png".to_string();
    file.kind = Some("image".to_string());
    db.save_file(&file).await.unwrap();

    let restored = db
        .get_file(&BookId::new("urn:orm:book:1"), "images/fig1.png")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.body, FileBody::Binary(payload));
    assert_eq!(restored.media_type, "image/png");

    db.close().await;
}

#[tokio::test]
async fn compound_key_enforces_uniqueness() {
    let (db, _guard) = test_db().await;

    db.save_file(&sample_file(
        "urn:orm:book:1",
        "ch1.html",
        FileBody::Text("first".to_string()),
    ))
    .await
    .unwrap();
    db.save_file(&sample_file(
        "urn:orm:book:1",
        "ch1.html",
        FileBody::Text("second".to_string()),
    ))
    .await
    .unwrap();

    let files = db
        .files_for_book(&BookId::new("urn:orm:book:1"))
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].body, FileBody::Text("second".to_string()));

    db.close().await;
}

#[tokio::test]
async fn same_path_under_different_books_is_distinct() {
    let (db, _guard) = test_db().await;

    db.save_file(&sample_file(
        "urn:orm:book:1",
        "ch1.html",
        FileBody::Text("one".to_string()),
    ))
    .await
    .unwrap();
    db.save_file(&sample_file(
        "urn:orm:book:2",
        "ch1.html",
        FileBody::Text("two".to_string()),
    ))
    .await
    .unwrap();

    let one = db
        .get_file(&BookId::new("urn:orm:book:1"), "ch1.html")
        .await
        .unwrap()
        .unwrap();
    let two = db
        .get_file(&BookId::new("urn:orm:book:2"), "ch1.html")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.body, FileBody::Text("one".to_string()));
    assert_eq!(two.body, FileBody::Text("two".to_string()));

    db.close().await;
}

#[tokio::test]
async fn cached_paths_reflects_saved_files() {
    let (db, _guard) = test_db().await;
    let id = BookId::new("urn:orm:book:1");

    assert!(db.cached_paths(&id).await.unwrap().is_empty());

    for path in ["content.opf", "ch1.html", "images/fig1.png"] {
        db.save_file(&sample_file(
            "urn:orm:book:1",
            path,
            FileBody::Text("x".to_string()),
        ))
        .await
        .unwrap();
    }

    let paths = db.cached_paths(&id).await.unwrap();
    assert_eq!(paths.len(), 3);
    assert!(paths.contains("content.opf"));
    assert!(paths.contains("ch1.html"));
    assert!(paths.contains("images/fig1.png"));

    db.close().await;
}
