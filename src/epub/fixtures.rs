//! Archive builders shared by the unit tests

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub struct ZipEntry {
    name: String,
    data: Vec<u8>,
    /// `None` for directories
    method: Option<CompressionMethod>,
}

impl ZipEntry {
    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            data: data.to_vec(),
            method: Some(CompressionMethod::Stored),
        }
    }

    pub fn deflated(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            data: data.to_vec(),
            method: Some(CompressionMethod::Deflated),
        }
    }

    pub fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::new(),
            method: None,
        }
    }
}

pub fn write_zip(path: &Path, entries: &[ZipEntry]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for entry in entries {
        match entry.method {
            Some(method) => {
                let options = SimpleFileOptions::default().compression_method(method);
                zip.start_file(entry.name.as_str(), options).unwrap();
                zip.write_all(&entry.data).unwrap();
            }
            None => {
                zip.add_directory(entry.name.as_str(), SimpleFileOptions::default())
                    .unwrap();
            }
        }
    }
    zip.finish().unwrap();
}

pub fn container_xml(package_path: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
        package_path
    )
}

/// XHTML document of exactly `len` bytes
pub fn chapter_of_len(title: &str, len: usize) -> String {
    let head = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><html xmlns="http://www.w3.org/1999/xhtml"><head><title>{}</title></head><body><p>"#,
        title
    );
    let tail = "</p></body></html>";
    let fill = len.saturating_sub(head.len() + tail.len());
    format!("{}{}{}", head, "x".repeat(fill), tail)
}

pub const SAMPLE_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Sample Book</dc:title>
    <dc:creator>A. Writer</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
    <item id="pic" href="images/pic.png"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="cover" linear="no"/>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

pub const SAMPLE_NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body>
  <nav epub:type="landmarks"><ol><li><a href="cover.xhtml">Start</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <ol>
      <li><a href="cover.xhtml">Cover</a></li>
      <li><a href="ch1.xhtml">Chapter 1</a></li>
      <li><a href="text/ch2.xhtml#start">Chapter
          2</a></li>
    </ol>
  </nav>
</body>
</html>"#;

pub const SAMPLE_NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="p1" playOrder="1">
      <navLabel><text>Part One</text></navLabel>
      <content src="ch1.xhtml"/>
      <navPoint id="p1-1" playOrder="2">
        <navLabel><text>Section A</text></navLabel>
        <content src="ch1.xhtml#a"/>
      </navPoint>
    </navPoint>
    <navPoint id="p2" playOrder="3">
      <navLabel><text>Part Two</text></navLabel>
      <content src="text/ch2.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;

pub const CH2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Two</title><link rel="stylesheet" href="../style.css"/></head>
<body><h1 id="start">Two</h1><p><a href="../ch1.xhtml#top">back</a> <img src="../images/pic.png"/></p></body></html>"#;

/// Entries of the standard test book, package document at `OEBPS/content.opf`
pub fn sample_entries(opf: &str, nav: Option<&str>, ncx: Option<&str>) -> Vec<ZipEntry> {
    let mut entries = vec![
        ZipEntry::stored("mimetype", b"application/epub+zip"),
        ZipEntry::deflated("META-INF/container.xml", container_xml("OEBPS/content.opf").as_bytes()),
        ZipEntry::deflated("OEBPS/content.opf", opf.as_bytes()),
        ZipEntry::stored("OEBPS/cover.xhtml", chapter_of_len("Cover", 200).as_bytes()),
        ZipEntry::stored("OEBPS/ch1.xhtml", chapter_of_len("One", 500).as_bytes()),
        ZipEntry::deflated("OEBPS/text/ch2.xhtml", CH2.as_bytes()),
        ZipEntry::deflated("OEBPS/style.css", b"body { margin: 0 }"),
        ZipEntry::stored("OEBPS/images/pic.png", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
    ];
    if let Some(nav) = nav {
        entries.push(ZipEntry::deflated("OEBPS/nav.xhtml", nav.as_bytes()));
    }
    if let Some(ncx) = ncx {
        entries.push(ZipEntry::deflated("OEBPS/toc.ncx", ncx.as_bytes()));
    }
    entries
}

/// Write the standard test book into `dir`
pub fn sample_book(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("sample.epub");
    write_zip(&path, &sample_entries(SAMPLE_OPF, Some(SAMPLE_NAV), Some(SAMPLE_NCX)));
    path
}
