//! The content-addressable store seen from the installer.
//!
//! The installer only talks to a [`StoreController`]: it asks for a package
//! to be fetched (getting back where it lives in the store and a handle to
//! the in-flight transfer), and later asks for the fetched files to be
//! imported into a project-private location. [`LocalStore`] is the on-disk
//! implementation.

pub mod integrity;
pub mod local;
pub mod tarball;

pub use local::LocalStore;

use crate::pkg::resolution::Resolution;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Store failure for a single package.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to download '{url}': {reason}")]
    Download { url: String, reason: String },

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("invalid integrity '{0}'")]
    InvalidIntegrity(String),

    #[error("failed to extract tarball: {0}")]
    Extract(String),

    #[error("unsupported resolution: {0}")]
    UnsupportedResolution(String),

    #[error("invalid package location '{0}'")]
    InvalidLocation(String),

    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("fetch task failed: {0}")]
    Task(String),

    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// Failure of a fetch shared by several requests for the same package.
    #[error("{0}")]
    Shared(Arc<StoreError>),
}

impl StoreError {
    pub(crate) fn io(context: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            context,
            path,
            source,
        }
    }
}

/// What to fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Store identity of the package.
    pub pkg_id: String,
    /// Package name, used for the directory inside the store entry.
    pub name: String,
    pub resolution: Resolution,
    /// Project root; local resolutions are relative to it.
    pub prefix: PathBuf,
    /// Re-hash files of an already stored package before trusting them.
    pub verify_store_integrity: bool,
    /// Refetch even when the store already holds the package.
    pub force: bool,
}

/// The file set of a fetched package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFilesResponse {
    /// True when the files were already in the store.
    pub from_store: bool,
    /// `/`-separated paths relative to the package root.
    pub files: Vec<String>,
}

/// Result of [`StoreController::fetch_package`].
#[derive(Debug)]
pub struct FetchResponse {
    /// The store entry of the package; its files end up under
    /// `<in_store_location>/node_modules/<name>`.
    pub in_store_location: PathBuf,
    pub fetching_files: FetchHandle,
}

/// How to import fetched files.
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub files: PackageFilesResponse,
    /// Overwrite an already populated target.
    pub force: bool,
    /// The project may write build side effects that get cached per engine,
    /// so the import must not share inodes with the store.
    pub side_effects_cache: bool,
}

/// Store operations the installer depends on.
pub trait StoreController: Send + Sync {
    /// Start fetching a package.
    ///
    /// Returns as soon as the store has decided where the package lives; the
    /// transfer itself continues behind the returned handle.
    ///
    /// # Errors
    /// Returns an error if the request can't be scheduled (e.g. an invalid
    /// package id).
    fn fetch_package(&self, request: FetchRequest) -> Result<FetchResponse, StoreError>;

    /// Import the files of a fetched package from `from` (in the store) to
    /// `to` (project-private).
    fn import_package(
        &self,
        from: &Path,
        to: &Path,
        request: ImportRequest,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Per-engine side-effect caches of a package: engine name -> directory.
    ///
    /// # Errors
    /// Returns an error if the cache directory exists but can't be read.
    fn cache_by_engine(&self, pkg_id: &str) -> Result<BTreeMap<String, PathBuf>, StoreError>;
}

type FilesResult = Result<PackageFilesResponse, StoreError>;

enum FetchState {
    Spawned(JoinHandle<FilesResult>),
    Ready(FilesResult),
}

/// Handle to a package's file set, in flight or already available.
///
/// The result can be taken exactly once; [`FetchHandle::take`] returns
/// `None` afterwards. Dropping a handle whose transfer was never taken
/// aborts the transfer.
pub struct FetchHandle {
    state: Mutex<Option<FetchState>>,
}

impl FetchHandle {
    /// Run `fetch` on the tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn<F>(fetch: F) -> Self
    where
        F: Future<Output = FilesResult> + Send + 'static,
    {
        Self {
            state: Mutex::new(Some(FetchState::Spawned(tokio::spawn(fetch)))),
        }
    }

    /// A handle whose result is already known.
    #[must_use]
    pub fn ready(result: FilesResult) -> Self {
        Self {
            state: Mutex::new(Some(FetchState::Ready(result))),
        }
    }

    /// Take the pending result. Only the first call returns `Some`.
    pub fn take(&self) -> Option<PendingFiles> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(PendingFiles)
    }

    /// Whether the result has already been taken.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for FetchHandle {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(FetchState::Spawned(handle)) = state {
            handle.abort();
        }
    }
}

impl fmt::Debug for FetchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchHandle")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// A taken fetch result, awaited with [`PendingFiles::wait`].
pub struct PendingFiles(FetchState);

impl PendingFiles {
    /// Wait for the transfer to finish.
    ///
    /// # Errors
    /// Returns the fetch error, or [`StoreError::Task`] if the task panicked
    /// or was cancelled.
    pub async fn wait(self) -> FilesResult {
        match self.0 {
            FetchState::Ready(result) => result,
            FetchState::Spawned(handle) => handle
                .await
                .map_err(|e| StoreError::Task(e.to_string()))?,
        }
    }
}
