use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration for the lode CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Options of one headless install run.
///
/// `development`, `optional` and `production` select which dependency
/// classes are materialized; all three are on by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    pub development: bool,
    pub optional: bool,
    pub production: bool,
    /// Use dependency-free packages straight from the store.
    pub independent_leaves: bool,
    /// Refetch and reimport everything, ignore side-effect caches.
    pub force: bool,
    pub verify_store_integrity: bool,
    /// Import by copy so build side effects can be cached per engine.
    pub side_effects_cache: bool,
    /// Project root holding the lockfile.
    pub prefix: PathBuf,
    pub store_path: PathBuf,
    /// Engine name used to pick side-effect caches.
    pub engine: String,
}

impl InstallOptions {
    /// Defaults for `prefix`: every dependency class, the default store and
    /// the engine of this machine.
    #[must_use]
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            development: true,
            optional: true,
            production: true,
            independent_leaves: false,
            force: false,
            verify_store_integrity: false,
            side_effects_cache: false,
            prefix: prefix.into(),
            store_path: crate::paths::store_dir(),
            engine: crate::engine::engine_name(),
        }
    }

    /// Only production dependencies (`--prod`).
    #[must_use]
    pub fn production_only(mut self) -> Self {
        self.development = false;
        self.production = true;
        self
    }

    /// Only development dependencies (`--dev`).
    #[must_use]
    pub fn development_only(mut self) -> Self {
        self.development = true;
        self.production = false;
        self
    }

    #[must_use]
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    #[must_use]
    pub fn with_independent_leaves(mut self, on: bool) -> Self {
        self.independent_leaves = on;
        self
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_verify_store_integrity(mut self, verify: bool) -> Self {
        self.verify_store_integrity = verify;
        self
    }

    #[must_use]
    pub fn with_side_effects_cache(mut self, on: bool) -> Self {
        self.side_effects_cache = on;
        self
    }

    #[must_use]
    pub fn with_store_path(mut self, store_path: impl Into<PathBuf>) -> Self {
        self.store_path = store_path.into();
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }
}
