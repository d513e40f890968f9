//! Book cache
//!
//! Books are built once per archive path and shared read-only. Concurrent
//! first requests for a path wait on one in-flight build instead of parsing
//! the archive again. Every lookup compares the file's mtime and length with
//! the cached entry and rebuilds when the file changed.
//!
//! Eviction only drops the cache's own `Arc`: a response still streaming
//! from an evicted book keeps it alive until it finishes.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;

use super::book::{Book, Fingerprint, OpenOptions};
use super::error::EpubError;

/// Error handed to every requester of a failed build
pub type BookError = Arc<EpubError>;

type BuildResult = Result<Arc<Book>, BookError>;
type InFlight = Shared<BoxFuture<'static, BuildResult>>;

/// Default number of books kept open
pub const DEFAULT_CAPACITY: usize = 16;

struct Cached {
    fingerprint: Fingerprint,
    /// Failures are kept too: a broken file stays broken until it changes
    outcome: BuildResult,
}

struct CacheState {
    books: LruCache<PathBuf, Cached>,
    in_flight: HashMap<PathBuf, InFlight>,
}

struct CacheInner {
    state: Mutex<CacheState>,
    options: OpenOptions,
    builds: AtomicUsize,
}

/// Thread-safe single-flight book cache
#[derive(Clone)]
pub struct BookCache {
    inner: Arc<CacheInner>,
}

impl Default for BookCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BookCache {
    /// Create a cache holding up to `capacity` books
    pub fn new(capacity: usize) -> Self {
        Self::with_options(capacity, OpenOptions::default())
    }

    pub fn with_options(capacity: usize, options: OpenOptions) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState {
                    books: LruCache::new(capacity),
                    in_flight: HashMap::new(),
                }),
                options,
                builds: AtomicUsize::new(0),
            }),
        }
    }

    /// Get the book at `path`, building it if needed.
    ///
    /// At most one build per path runs at a time; other callers await it.
    pub async fn get_or_build(&self, path: &Path) -> Result<Arc<Book>, BookError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            Arc::new(match e.kind() {
                io::ErrorKind::NotFound => EpubError::NotFound(path.display().to_string()),
                _ => EpubError::Io(e),
            })
        })?;
        if !metadata.is_file() {
            return Err(Arc::new(EpubError::NotFound(path.display().to_string())));
        }
        let fingerprint = Fingerprint::of(&metadata);
        let key = path.to_path_buf();

        let flight = {
            let mut state = self.inner.state.lock();

            if let Some(cached) = state.books.get(&key) {
                if cached.fingerprint == fingerprint {
                    tracing::debug!(path = %path.display(), "book cache hit");
                    return cached.outcome.clone();
                }
            }
            if state.books.pop(&key).is_some() {
                tracing::debug!(path = %path.display(), "book changed on disk, rebuilding");
            }

            match state.in_flight.get(&key) {
                Some(flight) => flight.clone(),
                None => {
                    let flight = self.build(key.clone(), fingerprint).boxed().shared();
                    state.in_flight.insert(key, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    fn build(
        &self,
        key: PathBuf,
        fingerprint: Fingerprint,
    ) -> impl Future<Output = BuildResult> + Send + 'static {
        let inner = Arc::clone(&self.inner);

        async move {
            inner.builds.fetch_add(1, Ordering::SeqCst);
            let options = inner.options;
            let path = key.clone();

            let outcome = match tokio::task::spawn_blocking(move || Book::open(&path, options)).await {
                Ok(Ok(book)) => Ok(Arc::new(book)),
                Ok(Err(e)) => Err(Arc::new(e)),
                Err(e) => Err(Arc::new(EpubError::Io(io::Error::other(e)))),
            };

            {
                let mut state = inner.state.lock();
                state.in_flight.remove(&key);
                match &outcome {
                    Ok(book) => {
                        let cached = Cached {
                            fingerprint: book.fingerprint(),
                            outcome: outcome.clone(),
                        };
                        if let Some((evicted, _)) = state.books.push(key, cached) {
                            tracing::debug!(path = %evicted.display(), "evicted book");
                        }
                    }
                    Err(e) if e.is_transient() => {
                        tracing::warn!(path = %key.display(), "failed to open book: {}", e);
                    }
                    Err(e) => {
                        tracing::warn!(path = %key.display(), "unreadable book: {}", e);
                        state.books.push(
                            key,
                            Cached {
                                fingerprint,
                                outcome: outcome.clone(),
                            },
                        );
                    }
                }
            }

            outcome
        }
    }

    /// Drop the entry for `path`; the next request rebuilds it
    pub fn invalidate(&self, path: &Path) -> bool {
        self.inner.state.lock().books.pop(path).is_some()
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.inner.state.lock().books.clear();
    }

    /// Number of cached entries, failed builds included
    pub fn len(&self) -> usize {
        self.inner.state.lock().books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times a book has been parsed since the cache was created
    pub fn parse_count(&self) -> usize {
        self.inner.builds.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::fixtures::{self, write_zip, ZipEntry};

    #[tokio::test]
    async fn test_concurrent_first_requests_parse_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::sample_book(dir.path());
        let cache = BookCache::new(4);

        let requests = (0..8).map(|_| cache.get_or_build(&path));
        let books = futures::future::join_all(requests).await;

        assert_eq!(cache.parse_count(), 1);
        let first = books[0].as_ref().unwrap();
        for book in &books {
            assert!(Arc::ptr_eq(first, book.as_ref().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_spawned_requests_parse_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::sample_book(dir.path());
        let cache = BookCache::new(4);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let path = path.clone();
                tokio::spawn(async move { cache.get_or_build(&path).await.map(|_| ()) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(cache.parse_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_and_rebuild_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::sample_book(dir.path());
        let cache = BookCache::new(4);

        let first = cache.get_or_build(&path).await.unwrap();
        let again = cache.get_or_build(&path).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.parse_count(), 1);

        // a different length changes the fingerprint even on coarse mtime clocks
        let mut entries = fixtures::sample_entries(fixtures::SAMPLE_OPF, Some(fixtures::SAMPLE_NAV), None);
        entries.push(ZipEntry::stored("OEBPS/extra.txt", b"more"));
        write_zip(&path, &entries);

        let rebuilt = cache.get_or_build(&path).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(cache.parse_count(), 2);
        assert!(rebuilt.archive().contains("OEBPS/extra.txt"));
        // the old book is still usable by whoever holds it
        assert!(first.archive().read_entry("OEBPS/ch1.xhtml", None).is_ok());
    }

    #[tokio::test]
    async fn test_failures_are_not_retried_until_the_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.epub");
        std::fs::write(&path, b"definitely not a zip archive").unwrap();
        let cache = BookCache::new(4);

        let err = cache.get_or_build(&path).await.unwrap_err();
        assert!(matches!(*err, EpubError::NotAnArchive(_)));
        assert!(cache.get_or_build(&path).await.is_err());
        assert_eq!(cache.parse_count(), 1);

        write_zip(&path, &fixtures::sample_entries(fixtures::SAMPLE_OPF, Some(fixtures::SAMPLE_NAV), None));
        assert!(cache.get_or_build(&path).await.is_ok());
        assert_eq!(cache.parse_count(), 2);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let a = fixtures::sample_book(dir.path());
        let b = dir.path().join("other.epub");
        std::fs::copy(&a, &b).unwrap();
        let cache = BookCache::new(1);

        let held = cache.get_or_build(&a).await.unwrap();
        cache.get_or_build(&b).await.unwrap();
        assert_eq!(cache.len(), 1);
        cache.get_or_build(&a).await.unwrap();
        assert_eq!(cache.parse_count(), 3);
        assert!(held.archive().read_entry("OEBPS/ch1.xhtml", None).is_ok());
    }

    #[tokio::test]
    async fn test_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BookCache::default();
        let err = cache.get_or_build(&dir.path().join("absent.epub")).await.unwrap_err();
        assert!(matches!(*err, EpubError::NotFound(_)));
        let err = cache.get_or_build(dir.path()).await.unwrap_err();
        assert!(matches!(*err, EpubError::NotFound(_)));
        assert_eq!(cache.parse_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::sample_book(dir.path());
        let cache = BookCache::new(2);
        cache.get_or_build(&path).await.unwrap();
        assert!(cache.invalidate(&path));
        cache.get_or_build(&path).await.unwrap();
        assert_eq!(cache.parse_count(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
