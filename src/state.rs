//! Application state management

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::BasicAuth;
use crate::config::Config;
use crate::epub::{BookCache, OpenOptions};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Content root {path} is not usable: {source}")]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Content root {0} is not a directory")]
    NotADirectory(PathBuf),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    root_dir: PathBuf,
    book_cache: BookCache,
    auth: Option<BasicAuth>,
}

impl AppState {
    /// Create the state for `config`. The root directory is canonicalized
    /// once here; every request path is confined under it.
    pub fn new(config: &Config) -> Result<Self, StateError> {
        let root_dir = config
            .root_dir
            .canonicalize()
            .map_err(|source| StateError::InvalidRoot {
                path: config.root_dir.clone(),
                source,
            })?;
        if !root_dir.is_dir() {
            return Err(StateError::NotADirectory(root_dir));
        }

        let options = OpenOptions {
            max_inflate: config.max_inflate_size,
        };

        Ok(Self {
            inner: Arc::new(AppStateInner {
                root_dir,
                book_cache: BookCache::with_options(config.book_cache_size, options),
                auth: config.credentials.clone().map(BasicAuth::new),
            }),
        })
    }

    /// Get the canonical content root
    pub fn root_dir(&self) -> &Path {
        &self.inner.root_dir
    }

    /// Get the book cache
    pub fn book_cache(&self) -> &BookCache {
        &self.inner.book_cache
    }

    /// Get the basic auth checker, if authentication is enabled
    pub fn auth(&self) -> Option<&BasicAuth> {
        self.inner.auth.as_ref()
    }
}
