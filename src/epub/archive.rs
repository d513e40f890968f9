//! Zip container access
//!
//! Stored entries are read straight from their data offset. Compressed
//! entries are inflated at most once and kept for the lifetime of the
//! archive, so range requests never decompress twice.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use flate2::read::DeflateDecoder;
use flate2::Crc;
use parking_lot::Mutex;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive};

use super::error::{EpubError, EpubResult};
use super::types::{Compression, EntryInfo};
use crate::stream::{read_exact_at, ByteSource};

/// Default ceiling for the declared size of an entry we agree to inflate
pub const DEFAULT_MAX_INFLATE: u64 = 512 * 1024 * 1024;

/// Most we reserve before inflating; larger entries grow the buffer as they go
const INITIAL_INFLATE_CAPACITY: u64 = 1024 * 1024;

/// An opened zip container
pub struct Archive {
    path: PathBuf,
    /// Handle used for positional reads
    data: Arc<File>,
    file_len: u64,
    /// Reader for compression methods other than deflate
    zip: Mutex<ZipArchive<BufReader<File>>>,
    entries: Vec<EntryInfo>,
    index: HashMap<String, usize>,
    /// Inflated contents, one slot per entry
    inflated: Vec<Mutex<Option<Bytes>>>,
    max_inflate: u64,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

fn open_error(err: ZipError) -> EpubError {
    match err {
        ZipError::Io(e) if e.kind() != io::ErrorKind::UnexpectedEof => EpubError::Io(e),
        other => EpubError::NotAnArchive(other.to_string()),
    }
}

impl Archive {
    /// Open a zip container and read its central directory
    pub fn open(path: impl AsRef<Path>) -> EpubResult<Self> {
        Self::open_with_limit(path, DEFAULT_MAX_INFLATE)
    }

    /// Open with a custom inflate ceiling
    pub fn open_with_limit(path: impl AsRef<Path>, max_inflate: u64) -> EpubResult<Self> {
        let path = path.as_ref();
        let data = File::open(path)?;
        let file_len = data.metadata()?.len();
        let mut zip = ZipArchive::new(BufReader::new(File::open(path)?)).map_err(open_error)?;

        let mut entries = Vec::with_capacity(zip.len());
        let mut index = HashMap::with_capacity(zip.len());
        for i in 0..zip.len() {
            let file = zip.by_index_raw(i).map_err(open_error)?;
            let compression = match file.compression() {
                CompressionMethod::Stored => Compression::Stored,
                CompressionMethod::Deflated => Compression::Deflated,
                _ => Compression::Other,
            };
            let entry = EntryInfo {
                name: file.name().to_string(),
                index: i,
                data_offset: file.data_start(),
                size: file.size(),
                compressed_size: file.compressed_size(),
                crc32: file.crc32(),
                compression,
                is_dir: file.is_dir(),
            };
            index.entry(entry.name.clone()).or_insert(i);
            entries.push(entry);
        }

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened archive");

        Ok(Self {
            path: path.to_path_buf(),
            data: Arc::new(data),
            file_len,
            zip: Mutex::new(zip),
            inflated: entries.iter().map(|_| Mutex::new(None)).collect(),
            entries,
            index,
            max_inflate,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in central directory order
    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&EntryInfo> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|e| !e.is_dir)
    }

    fn file_entry(&self, name: &str) -> EpubResult<&EntryInfo> {
        self.entry(name)
            .filter(|e| !e.is_dir)
            .ok_or_else(|| EpubError::EntryNotFound(name.to_string()))
    }

    /// Read an entry, or the `range` of it, clamped to the entry size
    pub fn read_entry(&self, name: &str, range: Option<Range<u64>>) -> EpubResult<Bytes> {
        let entry = self.file_entry(name)?;
        let range = match range {
            Some(r) => r.start.min(entry.size)..r.end.min(entry.size).max(r.start.min(entry.size)),
            None => 0..entry.size,
        };
        let len = (range.end - range.start) as usize;

        match entry.compression {
            Compression::Stored => {
                self.check_stored(entry)?;
                read_exact_at(&self.data, entry.data_offset + range.start, len)
                    .map_err(|e| stored_read_error(entry, e))
            }
            _ => {
                let content = self.inflate(entry)?;
                Ok(content.slice(range.start as usize..range.end as usize))
            }
        }
    }

    /// Entry contents as a streamable source.
    ///
    /// Stored entries stay on disk; compressed ones come from the inflate cache.
    pub fn source(&self, name: &str) -> EpubResult<ByteSource> {
        let entry = self.file_entry(name)?;
        match entry.compression {
            Compression::Stored => {
                self.check_stored(entry)?;
                Ok(ByteSource::File {
                    file: Arc::clone(&self.data),
                    offset: entry.data_offset,
                    len: entry.size,
                })
            }
            _ => Ok(ByteSource::Memory(self.inflate(entry)?)),
        }
    }

    fn check_stored(&self, entry: &EntryInfo) -> EpubResult<()> {
        if entry.compressed_size != entry.size {
            return Err(EpubError::corrupt(&entry.name, "stored entry size mismatch"));
        }
        match entry.data_offset.checked_add(entry.size) {
            Some(end) if end <= self.file_len => Ok(()),
            _ => Err(EpubError::corrupt(&entry.name, "entry data runs past end of file")),
        }
    }

    fn inflate(&self, entry: &EntryInfo) -> EpubResult<Bytes> {
        // Holding the slot makes concurrent readers of this entry wait for
        // one decompression; other entries are unaffected.
        let mut slot = self.inflated[entry.index].lock();
        if let Some(content) = slot.as_ref() {
            return Ok(content.clone());
        }

        if entry.size > self.max_inflate {
            return Err(EpubError::corrupt(
                &entry.name,
                format!("declared size {} exceeds inflate limit", entry.size),
            ));
        }

        let mut out = Vec::with_capacity(entry.size.min(INITIAL_INFLATE_CAPACITY) as usize);
        match entry.compression {
            Compression::Deflated => {
                let end = entry.data_offset.checked_add(entry.compressed_size);
                if end.map_or(true, |end| end > self.file_len) {
                    return Err(EpubError::corrupt(&entry.name, "entry data runs past end of file"));
                }
                let compressed = read_exact_at(&self.data, entry.data_offset, entry.compressed_size as usize)
                    .map_err(|e| stored_read_error(entry, e))?;
                DeflateDecoder::new(&compressed[..])
                    .take(self.max_inflate + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| EpubError::corrupt(&entry.name, e))?;

                let mut crc = Crc::new();
                crc.update(&out);
                if crc.sum() != entry.crc32 {
                    return Err(EpubError::corrupt(&entry.name, "CRC mismatch"));
                }
            }
            // the zip reader checks the CRC itself
            _ => {
                let mut zip = self.zip.lock();
                let file = zip
                    .by_index(entry.index)
                    .map_err(|e| EpubError::corrupt(&entry.name, e))?;
                file.take(self.max_inflate + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| EpubError::corrupt(&entry.name, e))?;
            }
        }

        if out.len() as u64 != entry.size {
            return Err(EpubError::corrupt(
                &entry.name,
                format!("inflated to {} bytes, expected {}", out.len(), entry.size),
            ));
        }

        let content = Bytes::from(out);
        tracing::debug!(entry = %entry.name, size = content.len(), "inflated archive entry");
        *slot = Some(content.clone());
        Ok(content)
    }
}

fn stored_read_error(entry: &EntryInfo, err: io::Error) -> EpubError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        EpubError::corrupt(&entry.name, err)
    } else {
        EpubError::Io(err)
    }
}
