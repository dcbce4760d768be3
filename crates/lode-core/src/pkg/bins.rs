//! Exposing package executables under a `.bin` directory.

use super::manifest::{BinCommand, ManifestError, PackageManifest};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Error while exposing executables.
#[derive(Debug, thiserror::Error)]
pub enum BinError {
    #[error("failed to create bin entry {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl BinError {
    /// The path the failure is about.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Create { path, .. } | Self::Scan { path, .. } => path,
            Self::Manifest(ManifestError::Read { path, .. } | ManifestError::Parse { path, .. }) => {
                path
            }
        }
    }
}

/// Expose the executables of the package at `pkg_dir` in `bin_dir`.
///
/// `pkg_dir` may be a symlink; it is read through. A package without a
/// manifest or without executables contributes nothing. Returns the created
/// entries.
///
/// # Errors
/// Returns an error if the manifest is unreadable or an entry cannot be
/// created.
pub fn link_pkg_bins(pkg_dir: &Path, bin_dir: &Path) -> Result<Vec<PathBuf>, BinError> {
    let Some(manifest) = PackageManifest::read(pkg_dir)? else {
        debug!(pkg = %pkg_dir.display(), "No package.json, no bins to link");
        return Ok(Vec::new());
    };

    let commands = manifest.bin_commands(pkg_dir);
    if commands.is_empty() {
        return Ok(Vec::new());
    }

    fs::create_dir_all(bin_dir).map_err(|source| BinError::Create {
        path: bin_dir.to_path_buf(),
        source,
    })?;

    let mut created = Vec::with_capacity(commands.len());
    for command in &commands {
        if let Some(entry) = expose_command(command, bin_dir)? {
            created.push(entry);
        }
    }
    Ok(created)
}

/// Expose the executables of every package found directly in `modules_dir`
/// (including `@scope/*` packages).
///
/// A missing `modules_dir` contributes nothing.
///
/// # Errors
/// Returns an error if the directory cannot be scanned or any package's bins
/// cannot be linked.
pub fn link_bins(modules_dir: &Path, bin_dir: &Path) -> Result<Vec<PathBuf>, BinError> {
    let mut created = Vec::new();
    for pkg_dir in list_packages(modules_dir)? {
        created.extend(link_pkg_bins(&pkg_dir, bin_dir)?);
    }
    Ok(created)
}

/// Package directories directly below `modules_dir`, sorted.
fn list_packages(modules_dir: &Path) -> Result<Vec<PathBuf>, BinError> {
    let scan_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| BinError::Scan { path, source }
    };

    let entries = match fs::read_dir(modules_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(scan_err(modules_dir)(e)),
    };

    let mut packages = Vec::new();
    for entry in entries {
        let entry = entry.map_err(scan_err(modules_dir))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        // Skip .bin and hidden directories
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        if name.starts_with('@') {
            for scoped in fs::read_dir(&path).map_err(scan_err(&path))? {
                let scoped = scoped.map_err(scan_err(&path))?;
                if !scoped.file_name().to_string_lossy().starts_with('.') {
                    packages.push(scoped.path());
                }
            }
        } else if path.is_dir() {
            packages.push(path);
        }
    }
    packages.sort();
    Ok(packages)
}

/// Set the execute bits on every existing bin script of the package at
/// `pkg_dir`. Packages without a readable manifest are left alone.
///
/// The store runs this once per entry so that exposing the commands later
/// never has to touch stored files.
///
/// # Errors
/// Returns an error if a script's permissions cannot be changed.
pub fn mark_executable(pkg_dir: &Path) -> Result<(), BinError> {
    let Ok(Some(manifest)) = PackageManifest::read(pkg_dir) else {
        return Ok(());
    };
    for command in manifest.bin_commands(pkg_dir) {
        if command.path.is_file() {
            platform::make_executable(&command.path).map_err(|source| BinError::Create {
                path: command.path.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Create the `.bin` entry for one command. Returns `None` when the script
/// does not exist.
fn expose_command(command: &BinCommand, bin_dir: &Path) -> Result<Option<PathBuf>, BinError> {
    if !command.path.is_file() {
        warn!(
            bin = %command.name,
            entrypoint = %command.path.display(),
            "Bin entry point doesn't exist, skipping"
        );
        return Ok(None);
    }

    let entry = platform::create_entry(command, bin_dir).map_err(|source| BinError::Create {
        path: bin_dir.join(&command.name),
        source,
    })?;
    Ok(Some(entry))
}

#[cfg(unix)]
mod platform {
    use super::BinCommand;
    use std::fs;
    use std::io;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    pub(super) fn create_entry(command: &BinCommand, bin_dir: &Path) -> io::Result<PathBuf> {
        let link = bin_dir.join(&command.name);
        let original = lode_util::fs::relative_path(bin_dir, &command.path)
            .unwrap_or_else(|| command.path.clone());

        make_executable(&command.path)?;

        if fs::read_link(&link).is_ok_and(|existing| existing == original) {
            return Ok(link);
        }
        match std::os::unix::fs::symlink(&original, &link) {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                fs::remove_file(&link)?;
                std::os::unix::fs::symlink(&original, &link)?;
            }
            other => other?,
        }
        Ok(link)
    }

    /// Add the execute bits. A hard-linked file is first replaced by a
    /// private copy so the other links keep their mode.
    pub(super) fn make_executable(path: &Path) -> io::Result<()> {
        use std::os::unix::fs::MetadataExt;

        let metadata = fs::metadata(path)?;
        let mode = metadata.permissions().mode();
        if mode & 0o111 != 0 {
            return Ok(());
        }
        if metadata.nlink() > 1 {
            let mut private = path.as_os_str().to_owned();
            private.push(".lode-copy");
            let private = PathBuf::from(private);
            fs::copy(path, &private)?;
            fs::rename(&private, path)?;
        }
        fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o111))
    }
}

#[cfg(not(unix))]
mod platform {
    use super::BinCommand;
    use std::io;
    use std::path::{Path, PathBuf};

    pub(super) fn make_executable(_path: &Path) -> io::Result<()> {
        Ok(())
    }

    pub(super) fn create_entry(command: &BinCommand, bin_dir: &Path) -> io::Result<PathBuf> {
        let shim = bin_dir.join(format!("{}.cmd", command.name));
        let target = lode_util::fs::relative_path(bin_dir, &command.path)
            .unwrap_or_else(|| command.path.clone());
        let content = format!(
            "@SETLOCAL\r\n@node \"%~dp0\\{}\" %*\r\n",
            target.display()
        );
        lode_util::fs::atomic_write(&shim, content.as_bytes())?;
        Ok(shim)
    }
}
