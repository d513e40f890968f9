//! EPUB types

use std::collections::HashMap;

use super::href::encode_path;

/// Compression method of an archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Stored,
    Deflated,
    /// Any other method supported by the zip reader
    Other,
}

/// Central directory record of one archive entry
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    /// Position in the central directory
    pub index: usize,
    /// Absolute file offset of the entry data
    pub data_offset: u64,
    /// Uncompressed size
    pub size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    pub compression: Compression,
    pub is_dir: bool,
}

/// Book metadata from the package document
#[derive(Debug, Clone, Default)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub creators: Vec<String>,
    pub language: Option<String>,
    pub identifier: Option<String>,
}

/// A manifest item
#[derive(Debug, Clone)]
pub struct Resource {
    /// Manifest id
    pub id: String,
    /// Archive path
    pub path: String,
    /// Declared media-type, if any
    pub media_type: Option<String>,
    pub properties: Vec<String>,
    /// Uncompressed length, `None` when the manifest names a missing entry
    pub len: Option<u64>,
}

impl Resource {
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }
}

/// An element of the reading order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Position in the spine
    pub index: usize,
    /// Index into [`BookStructure::resources`]
    pub resource: usize,
    pub linear: bool,
}

/// Normalized view of a package document
#[derive(Debug, Clone, Default)]
pub struct BookStructure {
    /// Archive path of the package document
    pub package_path: String,
    pub metadata: BookMetadata,
    pub resources: Vec<Resource>,
    pub chapters: Vec<Chapter>,
    /// Manifest item carrying the `nav` property
    pub nav: Option<usize>,
    /// Manifest item named by the spine `toc` attribute
    pub ncx: Option<usize>,
    pub(crate) by_id: HashMap<String, usize>,
    pub(crate) by_path: HashMap<String, usize>,
    pub(crate) spine_by_resource: HashMap<usize, usize>,
}

impl BookStructure {
    pub fn resource_by_id(&self, id: &str) -> Option<&Resource> {
        self.by_id.get(id).map(|&i| &self.resources[i])
    }

    pub fn resource_by_path(&self, path: &str) -> Option<&Resource> {
        self.by_path.get(path).map(|&i| &self.resources[i])
    }

    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    /// Resource behind a spine entry
    pub fn chapter_resource(&self, chapter: &Chapter) -> &Resource {
        &self.resources[chapter.resource]
    }

    /// Spine position of the document at `path`
    pub fn chapter_index_of(&self, path: &str) -> Option<usize> {
        let resource = self.by_path.get(path)?;
        self.spine_by_resource.get(resource).copied()
    }
}

/// Where a table of contents was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocSource {
    /// EPUB 3 navigation document (manifest index)
    Nav { resource: usize },
    /// EPUB 2 NCX document (manifest index)
    Ncx { resource: usize },
    /// Flat list derived from the spine
    Synthesized,
}

/// Destination of a TOC entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocTarget {
    /// Spine position when the target is a reading-order document
    pub chapter: Option<usize>,
    /// Archive path
    pub path: String,
    /// In-document anchor, kept verbatim
    pub anchor: Option<String>,
}

impl TocTarget {
    /// URL form relative to the book root, fragment included
    pub fn href(&self) -> String {
        let mut href = encode_path(&self.path);
        if let Some(anchor) = &self.anchor {
            href.push('#');
            href.push_str(anchor);
        }
        href
    }
}

/// Table of contents node; each node owns its children
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TocNode {
    pub title: String,
    pub target: Option<TocTarget>,
    pub children: Vec<TocNode>,
}

impl TocNode {
    pub fn new(title: impl Into<String>, target: Option<TocTarget>) -> Self {
        Self {
            title: title.into(),
            target,
            children: Vec::new(),
        }
    }
}

/// Table of contents of a book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocTree {
    pub source: TocSource,
    /// Root node; has no target and is never rendered
    pub root: TocNode,
}

impl TocTree {
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Top-level entries
    pub fn entries(&self) -> &[TocNode] {
        &self.root.children
    }

    /// Depth-first walk yielding `(level, node)`, level 0 being top-level
    pub fn walk(&self) -> TocWalk<'_> {
        TocWalk {
            stack: self.root.children.iter().rev().map(|n| (0, n)).collect(),
        }
    }

    /// Number of levels below the root
    pub fn depth(&self) -> usize {
        self.walk().map(|(level, _)| level + 1).max().unwrap_or(0)
    }
}

/// Iterator returned by [`TocTree::walk`]
pub struct TocWalk<'a> {
    stack: Vec<(usize, &'a TocNode)>,
}

impl<'a> Iterator for TocWalk<'a> {
    type Item = (usize, &'a TocNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (level, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (level + 1, child)));
        Some((level, node))
    }
}
