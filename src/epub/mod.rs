//! EPUB virtual-content engine
//!
//! Opens EPUB archives, parses the package and navigation documents and
//! serves individual resources out of the archive. Parsed books are shared
//! through [`BookCache`].

pub mod archive;
pub mod book;
pub mod cache;
pub mod error;
pub mod href;
pub mod nav;
pub mod package;
pub mod resolver;
pub mod types;
pub(crate) mod xml;

#[cfg(test)]
pub(crate) mod fixtures;

pub use archive::Archive;
pub use book::{Book, Fingerprint, OpenOptions};
pub use cache::{BookCache, BookError};
pub use error::{EpubError, EpubResult};
pub use resolver::{resolve, ResolvedResource, ResourceRequest};
pub use types::{
    BookMetadata, BookStructure, Chapter, EntryInfo, Resource, TocNode, TocSource, TocTarget,
    TocTree,
};
