use crate::pkg::bins::BinError;
use crate::pkg::dep_path::DepPathError;
use crate::pkg::lockfile::LockfileError;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes.
pub mod codes {
    pub const HEADLESS_LOCKFILE_REQUIRED: &str = "HEADLESS_LOCKFILE_REQUIRED";
    pub const HEADLESS_LOCKFILE_INVALID: &str = "HEADLESS_LOCKFILE_INVALID";
    pub const HEADLESS_INVALID_PREFIX: &str = "HEADLESS_INVALID_PREFIX";
    pub const HEADLESS_INVALID_DEP_PATH: &str = "HEADLESS_INVALID_DEP_PATH";
    pub const HEADLESS_MISSING_PACKAGE_NAME: &str = "HEADLESS_MISSING_PACKAGE_NAME";
    pub const HEADLESS_MISSING_DEPENDENCY: &str = "HEADLESS_MISSING_DEPENDENCY";
    pub const HEADLESS_FETCH_CONSUMED: &str = "HEADLESS_FETCH_CONSUMED";
    pub const HEADLESS_STORE_FAILED: &str = "HEADLESS_STORE_FAILED";
    pub const HEADLESS_LINK_FAILED: &str = "HEADLESS_LINK_FAILED";
    pub const HEADLESS_BIN_FAILED: &str = "HEADLESS_BIN_FAILED";
    pub const HEADLESS_TASK_FAILED: &str = "HEADLESS_TASK_FAILED";
}

/// Core error type for install operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Headless installation requires a lockfile ({lockfile} not found in {prefix})")]
    LockfileRequired { prefix: PathBuf, lockfile: &'static str },

    #[error("Invalid lockfile: {0}")]
    Lockfile(#[from] LockfileError),

    #[error("Invalid project prefix {path}: {reason}")]
    InvalidPrefix { path: PathBuf, reason: String },

    #[error("Invalid dependency path: {0}")]
    InvalidDepPath(#[from] DepPathError),

    #[error("Cannot determine the package name of {dep_path}")]
    MissingPackageName { dep_path: String },

    #[error("{dep_path} is referenced but not in the dependency graph")]
    MissingDependency { dep_path: String },

    #[error("Files of {dep_path} were already consumed")]
    FetchConsumed { dep_path: String },

    #[error("Store operation for {pkg_id} failed: {source}")]
    Store {
        pkg_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to link {path}: {source}")]
    Link {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to link executables at {}: {source}", .source.path().display())]
    Bin {
        #[from]
        source: BinError,
    },

    #[error("Install task failed: {0}")]
    Task(String),
}

impl Error {
    /// Stable code of this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::LockfileRequired { .. } => codes::HEADLESS_LOCKFILE_REQUIRED,
            Self::Lockfile(_) => codes::HEADLESS_LOCKFILE_INVALID,
            Self::InvalidPrefix { .. } => codes::HEADLESS_INVALID_PREFIX,
            Self::InvalidDepPath(_) => codes::HEADLESS_INVALID_DEP_PATH,
            Self::MissingPackageName { .. } => codes::HEADLESS_MISSING_PACKAGE_NAME,
            Self::MissingDependency { .. } => codes::HEADLESS_MISSING_DEPENDENCY,
            Self::FetchConsumed { .. } => codes::HEADLESS_FETCH_CONSUMED,
            Self::Store { .. } => codes::HEADLESS_STORE_FAILED,
            Self::Link { .. } => codes::HEADLESS_LINK_FAILED,
            Self::Bin { .. } => codes::HEADLESS_BIN_FAILED,
            Self::Task(_) => codes::HEADLESS_TASK_FAILED,
        }
    }

    pub(crate) fn store(pkg_id: &str) -> impl FnOnce(StoreError) -> Self {
        let pkg_id = pkg_id.to_string();
        move |source| Self::Store { pkg_id, source }
    }

    pub(crate) fn link(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Link { path, source }
    }
}

/// Result alias for install operations.
pub type Result<T> = std::result::Result<T, Error>;
