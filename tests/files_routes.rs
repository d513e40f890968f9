//! Integration tests for directory listings and plain file downloads.

mod common;

use axum::http::StatusCode;

use common::{body_bytes, body_text, get, header};

#[tokio::test]
async fn root_listing() {
    let root = common::content_root();
    let app = common::app(root.path());

    let response = get(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "content-type").starts_with("text/html"));
    let page = body_text(response).await;

    assert!(page.contains(r#"<div>[+&nbsp;<a href="/shelf">shelf</a>]</div>"#));
    assert!(page.contains(r#"[-&nbsp;<a href="/notes.txt">notes.txt</a>]&nbsp;[12.00 B]"#));
    // sorted by name
    let notes = page.find("notes.txt").unwrap();
    let report = page.find("report.pdf").unwrap();
    let shelf = page.find("shelf").unwrap();
    assert!(notes < report && report < shelf);
}

#[tokio::test]
async fn nested_listing_links_books_to_their_toc() {
    let root = common::content_root();
    let app = common::app(root.path());

    let page = body_text(get(&app, "/shelf", None).await).await;
    assert!(page.contains(r#"<a href="/shelf/sample.epub">sample.epub</a>]"#));
    assert!(page.contains(r#"[<a href="/epub_toc/shelf/sample.epub">Read</a>]"#));

    let page = body_text(get(&app, "/shelf/", None).await).await;
    assert!(page.contains(r#"<a href="/shelf/broken.epub">broken.epub</a>]"#));
}

#[tokio::test]
async fn file_download_with_guessed_type() {
    let root = common::content_root();
    let app = common::app(root.path());

    let response = get(&app, "/notes.txt", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "text/plain");
    assert_eq!(header(&response, "content-length"), "12");
    assert_eq!(body_text(response).await, "plain notes\n");

    let response = get(&app, "/report.pdf", None).await;
    assert_eq!(header(&response, "content-type"), "application/pdf");
}

#[tokio::test]
async fn file_type_sniffed_without_extension() {
    let root = common::content_root();
    std::fs::write(root.path().join("cover"), b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();
    let app = common::app(root.path());

    let response = get(&app, "/cover", None).await;
    assert_eq!(header(&response, "content-type"), "image/png");
}

#[tokio::test]
async fn file_range_request() {
    let root = common::content_root();
    let app = common::app(root.path());

    let response = get(&app, "/notes.txt", Some("bytes=0-4")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&response, "content-range"), "bytes 0-4/12");
    assert_eq!(body_bytes(response).await, b"plain".to_vec());

    let response = get(&app, "/notes.txt", Some("bytes=12-")).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn large_file_streams_intact() {
    let root = common::content_root();
    let data = common::big_payload();
    std::fs::write(root.path().join("big.bin"), &data).unwrap();
    let app = common::app(root.path());

    let response = get(&app, "/big.bin", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, data);

    let response = get(&app, "/big.bin", Some("bytes=100000-200000")).await;
    assert_eq!(body_bytes(response).await, data[100000..=200000].to_vec());
}

#[tokio::test]
async fn missing_and_escaping_paths() {
    let root = common::content_root();
    let app = common::app(root.path());

    let response = get(&app, "/missing.txt", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, "/..%2F..%2Fetc%2Fpasswd", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get(&app, "/shelf/%2E%2E/%2E%2E/secret", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
