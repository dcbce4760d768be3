//! Fetch descriptors derived from locked resolutions.

use super::dep_path::{self, DepPathError};
use super::lockfile::{LockResolution, PackageSnapshot};
use serde::Serialize;
use url::Url;

/// Everything the store needs to obtain one package's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Resolution {
    /// A tarball at `tarball` (http(s) URL or `file:` path).
    Tarball {
        tarball: String,
        integrity: Option<String>,
        registry: String,
    },
    /// A directory relative to the project prefix.
    Directory { directory: String },
    Git { repo: String, commit: String },
}

/// Build the fetch descriptor for the snapshot stored under `rel_dep_path`.
///
/// Integrity-only registry entries get the conventional tarball URL of their
/// registry; relative tarball URLs are joined onto the registry.
///
/// # Errors
/// Returns an error if the tarball URL has to be derived from a dependency
/// path that doesn't contain a name and version, or if the registry is not a
/// valid URL.
pub fn from_snapshot(
    rel_dep_path: &str,
    snapshot: &PackageSnapshot,
    registry: &str,
) -> Result<Resolution, DepPathError> {
    match &snapshot.resolution {
        LockResolution::Directory { directory, .. } => Ok(Resolution::Directory {
            directory: directory.clone(),
        }),
        LockResolution::Git { repo, commit, .. } => Ok(Resolution::Git {
            repo: repo.clone(),
            commit: commit.clone(),
        }),
        LockResolution::Tarball {
            integrity,
            tarball,
            registry: own_registry,
        } => {
            let registry = own_registry.as_deref().unwrap_or(registry);
            let tarball = match tarball {
                Some(t) => absolute_tarball_url(t, registry)?,
                None => registry_tarball_url(rel_dep_path, snapshot, registry)?,
            };
            Ok(Resolution::Tarball {
                tarball,
                integrity: integrity.clone(),
                registry: registry.to_string(),
            })
        }
    }
}

fn absolute_tarball_url(tarball: &str, registry: &str) -> Result<String, DepPathError> {
    if tarball.starts_with("file:") || Url::parse(tarball).is_ok() {
        return Ok(tarball.to_string());
    }
    let base = Url::parse(registry).map_err(|e| DepPathError::InvalidRegistry {
        url: registry.to_string(),
        reason: e.to_string(),
    })?;
    base.join(tarball)
        .map(String::from)
        .map_err(|e| DepPathError::InvalidRegistry {
            url: registry.to_string(),
            reason: e.to_string(),
        })
}

/// `<registry>/<name>/-/<unscoped-name>-<version>.tgz`
fn registry_tarball_url(
    rel_dep_path: &str,
    snapshot: &PackageSnapshot,
    registry: &str,
) -> Result<String, DepPathError> {
    let parsed = dep_path::parse(rel_dep_path)?;
    let (Some(parsed_name), Some(version)) = (parsed.name, parsed.version) else {
        return Err(DepPathError::InvalidRelative(rel_dep_path.to_string()));
    };
    let name = snapshot.name.clone().unwrap_or(parsed_name);
    let unscoped = name.rsplit_once('/').map_or(name.as_str(), |(_, n)| n);
    Ok(format!(
        "{}/{name}/-/{unscoped}-{}.tgz",
        registry.trim_end_matches('/'),
        dep_path::bare_version(&version)
    ))
}
