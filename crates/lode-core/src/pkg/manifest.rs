//! The parts of `package.json` the installer reads: executable entry points.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// `bin` is either a single script (command named after the package) or a
/// map of command name to script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BinField {
    Single(String),
    Map(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Directories {
    #[serde(default)]
    pub bin: Option<String>,
}

/// A package manifest, reduced to what bin linking needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bin: Option<BinField>,
    #[serde(default)]
    pub directories: Option<Directories>,
}

/// One executable to expose: the command name and the script it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinCommand {
    pub name: String,
    pub path: PathBuf,
}

/// Error reading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid package.json at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PackageManifest {
    /// Read `<pkg_dir>/package.json`. A missing manifest yields `Ok(None)`.
    ///
    /// # Errors
    /// Returns an error if the manifest exists but can't be read or parsed.
    pub fn read(pkg_dir: &Path) -> Result<Option<Self>, ManifestError> {
        let path = pkg_dir.join("package.json");
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ManifestError::Read { path, source }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| ManifestError::Parse { path, source })
    }

    /// Executables declared by this manifest, resolved against `pkg_dir`.
    ///
    /// `bin` wins over `directories.bin`. Unsafe command names and scripts
    /// that would escape the package directory are dropped.
    #[must_use]
    pub fn bin_commands(&self, pkg_dir: &Path) -> Vec<BinCommand> {
        let mut commands = Vec::new();

        match &self.bin {
            Some(BinField::Single(script)) => {
                if let Some(name) = self.name.as_deref() {
                    push_command(&mut commands, name, script, pkg_dir);
                }
            }
            Some(BinField::Map(map)) => {
                for (name, script) in map {
                    push_command(&mut commands, name, script, pkg_dir);
                }
            }
            None => {
                if let Some(dir) = self.directories.as_ref().and_then(|d| d.bin.as_deref()) {
                    commands_from_dir(&mut commands, dir, pkg_dir);
                }
            }
        }

        commands
    }
}

fn push_command(commands: &mut Vec<BinCommand>, name: &str, script: &str, pkg_dir: &Path) {
    let name = name.rsplit_once('/').map_or(name, |(scope, n)| {
        if scope.starts_with('@') {
            n
        } else {
            name
        }
    });
    if !is_safe_command_name(name) || !stays_inside(script) {
        return;
    }
    commands.push(BinCommand {
        name: name.to_string(),
        path: pkg_dir.join(script),
    });
}

fn commands_from_dir(commands: &mut Vec<BinCommand>, dir: &str, pkg_dir: &Path) {
    if !stays_inside(dir) {
        return;
    }
    let bin_dir = pkg_dir.join(dir);
    let Ok(files) = lode_util::fs::list_files(&bin_dir) else {
        return;
    };
    for rel in files {
        let name = rel.rsplit('/').next().unwrap_or(&rel).to_string();
        if is_safe_command_name(&name) {
            commands.push(BinCommand {
                name,
                path: bin_dir.join(&rel),
            });
        }
    }
}

fn is_safe_command_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', ':'])
}

fn stays_inside(rel: &str) -> bool {
    let mut depth = 0i32;
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}
