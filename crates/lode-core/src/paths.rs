use crate::pkg::lockfile::LOCKFILE_NAME;
use crate::version::SCHEMA_VERSION;
use std::path::{Path, PathBuf};

/// Environment variable overriding the store location.
pub const STORE_DIR_ENV: &str = "LODE_STORE_DIR";

/// Find the project root by walking up from `cwd` looking for a lockfile or
/// `package.json`.
///
/// Returns the first directory containing either marker, or `None` if neither is found.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(LOCKFILE_NAME).exists() || current.join("package.json").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Get the default content-addressable store directory.
///
/// `LODE_STORE_DIR` wins when set. Otherwise a platform-appropriate location
/// with versioning:
/// - Linux: `$XDG_DATA_HOME/lode/store/v{N}` or `~/.local/share/lode/store/v{N}`
/// - macOS: `~/Library/Application Support/lode/store/v{N}`
/// - Windows: `%APPDATA%\lode\store\v{N}`
#[must_use]
pub fn store_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(STORE_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    let base = dirs_next::data_dir().map_or_else(
        || {
            dirs_next::home_dir().map_or_else(
                || PathBuf::from(".lode-store"),
                |p| p.join(".local").join("share").join("lode"),
            )
        },
        |p| p.join("lode"),
    );

    base.join("store").join(format!("v{SCHEMA_VERSION}"))
}

/// The project-level `node_modules` directory.
#[must_use]
pub fn node_modules(prefix: &Path) -> PathBuf {
    prefix.join("node_modules")
}
