//! Error types for the EPUB engine

use thiserror::Error;

/// Result type for book operations
pub type EpubResult<T> = std::result::Result<T, EpubError>;

/// Errors raised while opening, parsing or reading a book
#[derive(Error, Debug)]
pub enum EpubError {
    /// The archive file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a zip container
    #[error("Not a zip archive: {0}")]
    NotAnArchive(String),

    /// No entry with this name in the central directory
    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),

    /// Entry data could not be extracted
    #[error("Corrupt archive entry {name}: {reason}")]
    CorruptEntry { name: String, reason: String },

    /// container.xml is missing or does not point at a package document
    #[error("Missing root file: {0}")]
    MissingRootFile(String),

    /// The package document is not usable
    #[error("Malformed package document: {0}")]
    MalformedPackage(String),

    /// Resource or chapter absent from the book
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested path would escape the book
    #[error("Out of book access: {0}")]
    OutOfBookAccess(String),
}

impl EpubError {
    pub(crate) fn corrupt(name: &str, reason: impl ToString) -> Self {
        EpubError::CorruptEntry {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Failures caused by the environment rather than the archive contents.
    ///
    /// These are worth retrying on the next request; everything else is a
    /// property of the file and stays the same until it changes.
    pub fn is_transient(&self) -> bool {
        matches!(self, EpubError::Io(_))
    }

    /// Structural problems that make the book unreadable
    pub fn is_unreadable_book(&self) -> bool {
        matches!(
            self,
            EpubError::NotAnArchive(_)
                | EpubError::CorruptEntry { .. }
                | EpubError::MissingRootFile(_)
                | EpubError::MalformedPackage(_)
        )
    }
}
