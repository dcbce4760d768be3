//! Lockfile types and the "wanted lockfile" reader.
//!
//! The lockfile pins every package in the dependency tree to an exact
//! dependency path and content identity. Installing from it never resolves
//! anything.
//!
//! ## File Format
//!
//! The lockfile is a JSON file named `lode-lock.json`:
//!
//! ```json
//! {
//!   "lockfileVersion": 1,
//!   "registry": "https://registry.npmjs.org/",
//!   "dependencies": { "a": "1.0.0" },
//!   "packages": {
//!     "/a/1.0.0": {
//!       "resolution": { "integrity": "sha512-..." },
//!       "dependencies": { "b": "2.0.0" },
//!       "dev": false
//!     }
//!   }
//! }
//! ```
//!
//! Keys of `packages` are relative dependency paths (`/name/version`), or
//! absolute ones (`host/name/version`) for packages from another registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Schema version for the lockfile format.
pub const PKG_LOCK_SCHEMA_VERSION: u32 = 1;

/// Lockfile filename.
pub const LOCKFILE_NAME: &str = "lode-lock.json";

/// Registry assumed when the lockfile does not name one.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Lockfile error codes.
pub mod codes {
    /// Lockfile could not be read.
    pub const PKG_LOCK_READ_FAILED: &str = "PKG_LOCK_READ_FAILED";
    /// Lockfile has invalid JSON.
    pub const PKG_LOCK_INVALID_JSON: &str = "PKG_LOCK_INVALID_JSON";
    /// Lockfile schema version mismatch.
    pub const PKG_LOCK_VERSION_MISMATCH: &str = "PKG_LOCK_VERSION_MISMATCH";
}

/// How a locked package's content is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LockResolution {
    /// A local directory, relative to the project.
    Directory {
        #[serde(rename = "type")]
        kind: DirectoryTag,
        directory: String,
    },
    /// A git commit.
    Git {
        #[serde(rename = "type")]
        kind: GitTag,
        repo: String,
        commit: String,
    },
    /// A registry (or plain URL) tarball. `tarball` is derived from the
    /// dependency path when absent.
    Tarball {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        integrity: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tarball: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        registry: Option<String>,
    },
}

/// `"type": "directory"` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryTag {
    #[serde(rename = "directory")]
    Directory,
}

/// `"type": "git"` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GitTag {
    #[serde(rename = "git")]
    Git,
}

impl Default for LockResolution {
    fn default() -> Self {
        Self::Tarball {
            integrity: None,
            tarball: None,
            registry: None,
        }
    }
}

impl LockResolution {
    /// A registry resolution pinned only by its integrity.
    #[must_use]
    pub fn integrity(integrity: impl Into<String>) -> Self {
        Self::Tarball {
            integrity: Some(integrity.into()),
            tarball: None,
            registry: None,
        }
    }

    /// A local directory resolution.
    #[must_use]
    pub fn directory(path: impl Into<String>) -> Self {
        Self::Directory {
            kind: DirectoryTag::Directory,
            directory: path.into(),
        }
    }
}

/// `bundledDependencies` is either a flag or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundledDependencies {
    Flag(bool),
    List(Vec<String>),
}

/// One locked package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSnapshot {
    /// Package name; parsed from the dependency path when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Store identity; defaults to the canonical dependency path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub resolution: LockResolution,
    /// alias -> dependency path reference (`1.0.0`, `/b/1.0.0`, `host/b/1.0.0`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundled_dependencies: Option<BundledDependencies>,
    /// `Some(true)`: dev only. `Some(false)`: prod only. `None`: both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

impl PackageSnapshot {
    /// Whether the package is only reachable through optional edges.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional == Some(true)
    }

    /// Whether the package ships dependencies inside its own tarball.
    #[must_use]
    pub fn has_bundled_dependencies(&self) -> bool {
        match &self.bundled_dependencies {
            Some(BundledDependencies::Flag(flag)) => *flag,
            Some(BundledDependencies::List(_)) => true,
            None => false,
        }
    }

    /// True when the package has neither regular nor optional dependencies.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.dependencies.is_empty() && self.optional_dependencies.is_empty()
    }
}

fn default_lockfile_version() -> u32 {
    PKG_LOCK_SCHEMA_VERSION
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

/// The complete lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    #[serde(default = "default_lockfile_version")]
    pub lockfile_version: u32,
    /// Base registry URL used to make relative dependency paths absolute.
    #[serde(default = "default_registry")]
    pub registry: String,
    /// Root production dependencies (alias -> version).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_dependencies: BTreeMap<String, String>,
    /// Root ranges as written in package.json (alias -> range).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub specifiers: BTreeMap<String, String>,
    /// All locked packages keyed by dependency path.
    #[serde(default)]
    pub packages: BTreeMap<String, PackageSnapshot>,
}

impl Default for Lockfile {
    fn default() -> Self {
        Self {
            lockfile_version: PKG_LOCK_SCHEMA_VERSION,
            registry: default_registry(),
            dependencies: BTreeMap::new(),
            dev_dependencies: BTreeMap::new(),
            optional_dependencies: BTreeMap::new(),
            specifiers: BTreeMap::new(),
            packages: BTreeMap::new(),
        }
    }
}

impl Lockfile {
    /// Create an empty lockfile for the given registry.
    #[must_use]
    pub fn new(registry: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            ..Self::default()
        }
    }

    /// Add a package under its (relative or absolute) dependency path.
    pub fn add_package(&mut self, dep_path: impl Into<String>, snapshot: PackageSnapshot) {
        self.packages.insert(dep_path.into(), snapshot);
    }

    /// Read a lockfile from a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if its
    /// version is not supported.
    pub fn read_from(path: &Path) -> Result<Self, LockfileError> {
        let content = fs::read_to_string(path).map_err(|e| {
            LockfileError::new(
                codes::PKG_LOCK_READ_FAILED,
                format!("Failed to read lockfile {}: {e}", path.display()),
            )
        })?;

        let lockfile = Self::from_json(&content)?;

        if lockfile.lockfile_version != PKG_LOCK_SCHEMA_VERSION {
            return Err(LockfileError::new(
                codes::PKG_LOCK_VERSION_MISMATCH,
                format!(
                    "Lockfile version {} not supported (expected {})",
                    lockfile.lockfile_version, PKG_LOCK_SCHEMA_VERSION
                ),
            ));
        }

        Ok(lockfile)
    }

    /// Write the lockfile to a path atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), LockfileError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            LockfileError::new(
                codes::PKG_LOCK_INVALID_JSON,
                format!("Failed to serialize lockfile: {e}"),
            )
        })?;

        lode_util::fs::atomic_write(path, content.as_bytes()).map_err(|e| {
            LockfileError::new(
                codes::PKG_LOCK_READ_FAILED,
                format!("Failed to write lockfile: {e}"),
            )
        })
    }

    /// Deserialize from JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self, LockfileError> {
        serde_json::from_str(json).map_err(|e| {
            LockfileError::new(
                codes::PKG_LOCK_INVALID_JSON,
                format!("Invalid lockfile JSON: {e}"),
            )
        })
    }
}

/// Read the wanted lockfile of the project at `prefix`.
///
/// Returns `Ok(None)` when the project has no lockfile.
///
/// # Errors
///
/// Returns an error if the lockfile exists but cannot be read or parsed.
pub fn read_wanted(prefix: &Path) -> Result<Option<Lockfile>, LockfileError> {
    let path = prefix.join(LOCKFILE_NAME);
    match fs::symlink_metadata(&path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        _ => {}
    }
    Lockfile::read_from(&path).map(Some)
}

/// Lockfile error.
#[derive(Debug)]
pub struct LockfileError {
    code: &'static str,
    message: String,
}

impl LockfileError {
    /// Create a new error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LockfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for LockfileError {}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "lockfileVersion": 1,
  "registry": "https://registry.npmjs.org/",
  "dependencies": { "a": "1.0.0" },
  "packages": {
    "/a/1.0.0": {
      "resolution": { "integrity": "sha512-aaa" },
      "dependencies": { "b": "2.0.0" },
      "optionalDependencies": { "c": "3.0.0" },
      "dev": false
    },
    "/b/2.0.0": {
      "resolution": { "type": "directory", "directory": "../b" },
      "bundledDependencies": ["x"]
    },
    "/c/3.0.0": {
      "resolution": { "type": "git", "repo": "https://example.com/c.git", "commit": "abc" },
      "optional": true
    }
  }
}"#;

    #[test]
    fn test_parse_sample() {
        let lockfile = Lockfile::from_json(SAMPLE).unwrap();
        assert_eq!(lockfile.packages.len(), 3);

        let a = &lockfile.packages["/a/1.0.0"];
        assert_eq!(a.dev, Some(false));
        assert_eq!(a.resolution, LockResolution::integrity("sha512-aaa"));
        assert_eq!(a.dependencies["b"], "2.0.0");
        assert!(!a.is_leaf());

        let b = &lockfile.packages["/b/2.0.0"];
        assert_eq!(b.resolution, LockResolution::directory("../b"));
        assert!(b.has_bundled_dependencies());
        assert_eq!(b.dev, None);

        let c = &lockfile.packages["/c/3.0.0"];
        assert!(matches!(c.resolution, LockResolution::Git { ref commit, .. } if commit == "abc"));
        assert!(c.is_optional());
    }

    #[test]
    fn test_missing_fields_default() {
        let lockfile = Lockfile::from_json("{}").unwrap();
        assert_eq!(lockfile.lockfile_version, PKG_LOCK_SCHEMA_VERSION);
        assert_eq!(lockfile.registry, DEFAULT_REGISTRY);
        assert!(lockfile.packages.is_empty());
    }

    #[test]
    fn test_bundled_flag_false() {
        let snapshot: PackageSnapshot =
            serde_json::from_str(r#"{ "bundledDependencies": false }"#).unwrap();
        assert!(!snapshot.has_bundled_dependencies());
    }

    #[test]
    fn test_read_wanted_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_wanted(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_read_wanted_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCKFILE_NAME), "not valid json").unwrap();

        let err = read_wanted(dir.path()).unwrap_err();
        assert_eq!(err.code(), codes::PKG_LOCK_INVALID_JSON);
    }

    #[test]
    fn test_read_wanted_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCKFILE_NAME), r#"{"lockfileVersion": 99}"#).unwrap();

        let err = read_wanted(dir.path()).unwrap_err();
        assert_eq!(err.code(), codes::PKG_LOCK_VERSION_MISMATCH);
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut lockfile = Lockfile::from_json(SAMPLE).unwrap();
        lockfile.add_package("/d/1.0.0", PackageSnapshot::default());

        lockfile.write_to(&dir.path().join(LOCKFILE_NAME)).unwrap();

        let loaded = read_wanted(dir.path()).unwrap().unwrap();
        assert_eq!(lockfile, loaded);
    }
}
