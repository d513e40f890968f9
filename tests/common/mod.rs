//! Shared fixtures for the integration tests: a content root with a small
//! EPUB built on the fly, plus helpers to drive the router.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use shelfserve::config::{Config, Credentials};
use shelfserve::state::AppState;

/// Relative path of the sample book under the content root
pub const BOOK: &str = "shelf/sample.epub";

pub const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:sample</dc:identifier>
    <dc:title>Sample Book</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
    <item id="big" href="big.bin" media-type="application/octet-stream"/>
    <item id="legacy" href="legacy.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="cover"/>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

pub const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body>
  <nav epub:type="toc">
    <ol>
      <li><a href="cover.xhtml">Cover</a></li>
      <li><a href="ch1.xhtml">Chapter 1</a></li>
      <li><a href="text/ch2.xhtml#start">Chapter 2</a></li>
    </ol>
  </nav>
</body>
</html>"#;

pub const CH2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Two</title><link rel="stylesheet" href="../style.css"/></head>
<body><h1 id="start">Two</h1><p><a href="../ch1.xhtml#top">back</a> <a href="../../../../etc/passwd">out</a> <a href="https://example.com/">web</a></p></body></html>"#;

/// XHTML document of exactly `len` bytes
pub fn chapter_of_len(title: &str, len: usize) -> Vec<u8> {
    let head = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><html xmlns="http://www.w3.org/1999/xhtml"><head><title>{}</title></head><body><p>"#,
        title
    );
    let tail = "</p></body></html>";
    let fill = len - head.len() - tail.len();
    format!("{}{}{}", head, "x".repeat(fill), tail).into_bytes()
}

/// UTF-16LE XHTML document with a byte order mark
pub fn utf16_document() -> Vec<u8> {
    let text = r#"<?xml version="1.0" encoding="UTF-16"?><html xmlns="http://www.w3.org/1999/xhtml"><body><p>Ünïcode</p></body></html>"#;
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
    bytes
}

/// 300 KB of deterministic, poorly compressible data
pub fn big_payload() -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;
    (0..300 * 1024)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

fn container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#
        .to_string()
}

pub fn write_book(path: &Path) {
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let entries: Vec<(&str, Vec<u8>, SimpleFileOptions)> = vec![
        ("mimetype", b"application/epub+zip".to_vec(), stored),
        ("META-INF/container.xml", container_xml().into_bytes(), deflated),
        ("OEBPS/content.opf", OPF.as_bytes().to_vec(), deflated),
        ("OEBPS/nav.xhtml", NAV.as_bytes().to_vec(), deflated),
        ("OEBPS/cover.xhtml", chapter_of_len("Cover", 200), stored),
        ("OEBPS/ch1.xhtml", chapter_of_len("One", 500), stored),
        ("OEBPS/text/ch2.xhtml", CH2.as_bytes().to_vec(), deflated),
        ("OEBPS/style.css", b"body { margin: 0 }".to_vec(), deflated),
        ("OEBPS/big.bin", big_payload(), deflated),
        ("OEBPS/legacy.xhtml", utf16_document(), deflated),
    ];

    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, data, options) in entries {
        zip.start_file(name, options).unwrap();
        zip.write_all(&data).unwrap();
    }
    zip.finish().unwrap();
}

/// Content root with the sample book, a broken book and a few plain files
pub fn content_root() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("shelf")).unwrap();
    write_book(&dir.path().join(BOOK));
    std::fs::write(dir.path().join("shelf/broken.epub"), b"this is not a zip file").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"plain notes\n").unwrap();
    std::fs::write(dir.path().join("report.pdf"), b"%PDF-1.4 fake").unwrap();
    dir
}

pub fn state(root: &Path) -> AppState {
    AppState::new(&Config::new(root)).unwrap()
}

pub fn app(root: &Path) -> Router {
    shelfserve::app(state(root))
}

/// Router that requires `myuser` / `mypassword`
pub fn app_with_auth(root: &Path) -> Router {
    let mut config = Config::new(root);
    config.credentials = Some(Credentials {
        user_name: "myuser".to_string(),
        password_hash: bcrypt::hash("mypassword", 4).unwrap(),
    });
    shelfserve::app(AppState::new(&config).unwrap())
}

/// URL-safe unpadded base64 id of a root-relative book path
pub fn book_id(relative: &str) -> String {
    shelfserve::routes::epub::book_id(relative)
}

pub async fn get(app: &Router, uri: &str, range: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().uri(uri);
    if let Some(range) = range {
        request = request.header("range", range);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub fn header<'a>(response: &'a Response<Body>, name: &str) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}
