//! Dependency paths.
//!
//! A dependency path identifies one resolved package instance:
//!
//! - relative: `/name/version` or `/@scope/name/version`, implicitly on the
//!   lockfile's registry,
//! - absolute: `registry.npmjs.org/name/version`, the registry host (with `:`
//!   replaced by `+`) prefixed.
//!
//! The absolute form is the canonical key of the dependency graph. The
//! version segment may carry a peer suffix (`1.0.0_react@18.0.0`).

use thiserror::Error;
use url::Url;

/// Invalid dependency path or registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DepPathError {
    #[error("{0} is an invalid relative dependency path")]
    InvalidRelative(String),
    #[error("dependency path is empty")]
    Empty,
    #[error("invalid registry URL '{url}': {reason}")]
    InvalidRegistry { url: String, reason: String },
}

/// A dependency path split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDepPath {
    pub is_absolute: bool,
    pub host: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Absolute paths carry their registry host; relative ones start with `/`.
#[must_use]
pub fn is_absolute(dep_path: &str) -> bool {
    !dep_path.starts_with('/')
}

/// Turn a registry URL into the host segment used in absolute paths.
///
/// # Errors
/// Returns an error if `registry` is not a URL with a host.
pub fn encode_registry(registry: &str) -> Result<String, DepPathError> {
    let url = Url::parse(registry).map_err(|e| DepPathError::InvalidRegistry {
        url: registry.to_string(),
        reason: e.to_string(),
    })?;
    let host = url.host_str().ok_or_else(|| DepPathError::InvalidRegistry {
        url: registry.to_string(),
        reason: "no host".to_string(),
    })?;
    Ok(match url.port() {
        Some(port) => format!("{host}+{port}"),
        None => host.to_string(),
    })
}

/// Make `dep_path` absolute using `registry`. Absolute paths are returned
/// unchanged.
///
/// # Errors
/// Returns an error if the path is empty or the registry is not a URL.
pub fn resolve(registry: &str, dep_path: &str) -> Result<String, DepPathError> {
    if dep_path.is_empty() {
        return Err(DepPathError::Empty);
    }
    if is_absolute(dep_path) {
        return Ok(dep_path.to_string());
    }
    Ok(format!("{}{dep_path}", encode_registry(registry)?))
}

/// Convert a dependency reference (as found in a snapshot's dependency map)
/// into a relative dependency path.
///
/// A bare version becomes `/<name>/<version>`. `link:` references point
/// outside the store and yield `None`.
#[must_use]
pub fn ref_to_relative(reference: &str, pkg_name: &str) -> Option<String> {
    if reference.starts_with("link:") {
        return None;
    }
    if reference.starts_with("file:") || reference.contains('/') {
        return Some(reference.to_string());
    }
    Some(format!("/{pkg_name}/{reference}"))
}

/// Convert a dependency reference into a canonical absolute dependency path.
///
/// # Errors
/// Returns an error if the registry is not a URL.
pub fn ref_to_absolute(
    reference: &str,
    pkg_name: &str,
    registry: &str,
) -> Result<Option<String>, DepPathError> {
    if reference.starts_with("link:") {
        return Ok(None);
    }
    if !reference.contains('/') {
        let Some(relative) = ref_to_relative(reference, pkg_name) else {
            return Ok(None);
        };
        return resolve(registry, &relative).map(Some);
    }
    if is_absolute(reference) {
        return Ok(Some(reference.to_string()));
    }
    resolve(registry, reference).map(Some)
}

/// Split a dependency path into host, name and version.
///
/// # Errors
/// Returns an error for an empty path, or for a relative path without a
/// version segment.
pub fn parse(dep_path: &str) -> Result<ParsedDepPath, DepPathError> {
    if dep_path.is_empty() {
        return Err(DepPathError::Empty);
    }
    let absolute = is_absolute(dep_path);
    let mut parts = dep_path.split('/');
    if !absolute {
        parts.next();
    }
    let host = if absolute {
        parts.next().map(str::to_string)
    } else {
        None
    };

    let name = match parts.next() {
        Some(scope) if scope.starts_with('@') => parts.next().map(|n| format!("{scope}/{n}")),
        Some(name) if !name.is_empty() => Some(name.to_string()),
        _ => None,
    };
    let version = parts.next().filter(|v| !v.is_empty()).map(str::to_string);

    if name.is_some() && version.is_some() {
        return Ok(ParsedDepPath {
            is_absolute: absolute,
            host,
            name,
            version,
        });
    }
    if !absolute {
        return Err(DepPathError::InvalidRelative(dep_path.to_string()));
    }
    Ok(ParsedDepPath {
        is_absolute: true,
        host,
        name: None,
        version: None,
    })
}

/// Strip a peer-dependency suffix from a version segment.
#[must_use]
pub fn bare_version(version: &str) -> &str {
    version.split_once('_').map_or(version, |(v, _)| v)
}
