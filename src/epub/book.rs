//! An opened book
//!
//! A [`Book`] bundles the archive with everything parsed out of it. It is
//! immutable once built and shared as `Arc<Book>`; the only interior state
//! is the cache of rendered reader pages.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use parking_lot::Mutex;

use super::archive::{Archive, DEFAULT_MAX_INFLATE};
use super::error::EpubResult;
use super::nav::build_toc;
use super::package::parse_package;
use super::types::{BookStructure, TocTree};

/// Identity of the file a book was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl Fingerprint {
    pub fn of(metadata: &Metadata) -> Self {
        Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        }
    }
}

/// Knobs for opening books
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Largest declared entry size that will be inflated
    pub max_inflate: u64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            max_inflate: DEFAULT_MAX_INFLATE,
        }
    }
}

/// Archive plus parsed package, TOC and resource index
pub struct Book {
    path: PathBuf,
    fingerprint: Fingerprint,
    archive: Archive,
    structure: BookStructure,
    toc: TocTree,
    rendered: Mutex<HashMap<String, Bytes>>,
}

impl std::fmt::Debug for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Book")
            .field("path", &self.path)
            .field("chapters", &self.structure.chapters.len())
            .finish()
    }
}

impl Book {
    /// Open and parse the book at `path`. Blocking.
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> EpubResult<Self> {
        let path = path.as_ref();
        let fingerprint = Fingerprint::of(&std::fs::metadata(path)?);
        let archive = Archive::open_with_limit(path, options.max_inflate)?;
        let structure = parse_package(&archive)?;
        let toc = build_toc(&archive, &structure);

        tracing::info!(
            path = %path.display(),
            chapters = structure.chapters.len(),
            resources = structure.resources.len(),
            toc_source = ?toc.source,
            "opened book"
        );

        Ok(Self {
            path: path.to_path_buf(),
            fingerprint,
            archive,
            structure,
            toc,
            rendered: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn structure(&self) -> &BookStructure {
        &self.structure
    }

    pub fn toc(&self) -> &TocTree {
        &self.toc
    }

    /// Display title: metadata title, else the file stem
    pub fn title(&self) -> String {
        self.structure
            .metadata
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| {
                self.path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
    }

    /// Archive path of a spine item
    pub fn chapter_path(&self, index: usize) -> Option<&str> {
        let chapter = self.structure.chapter(index)?;
        Some(self.structure.chapter_resource(chapter).path.as_str())
    }

    /// Archive paths of the spine items around `index`
    pub fn neighbours(&self, index: usize) -> (Option<&str>, Option<&str>) {
        let prev = index.checked_sub(1).and_then(|i| self.chapter_path(i));
        (prev, self.chapter_path(index + 1))
    }

    /// Rendered reader page for `path`, produced once per book
    pub fn rendered_page<E, F>(&self, path: &str, render: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Result<Bytes, E>,
    {
        if let Some(page) = self.rendered.lock().get(path) {
            return Ok(page.clone());
        }
        let page = render()?;
        self.rendered
            .lock()
            .entry(path.to_string())
            .or_insert(page.clone());
        Ok(page)
    }
}
