use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// The file will either have the old contents or the new contents, never a
/// partial write.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Windows refuses to rename over an existing file
            if cfg!(windows) {
                fs::copy(&temp_path, path)?;
                let _ = fs::remove_file(&temp_path);
                Ok(())
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

/// List every regular file below `root` as a `/`-separated relative path.
///
/// Symlinks are not followed. The result is sorted.
///
/// # Errors
/// Returns an error if a directory cannot be read.
pub fn list_files(root: &Path) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(rel);
    }
    files.sort();
    Ok(files)
}

/// Hard-link `src` to `dst`, falling back to a copy when linking fails
/// (cross-device stores, filesystems without hard links).
///
/// Parent directories of `dst` are created.
///
/// # Errors
/// Returns an error if neither linking nor copying succeeds.
pub fn link_or_copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::hard_link(src, dst).is_ok() {
        return Ok(());
    }
    fs::copy(src, dst).map(|_| ())
}

/// Recursively copy a directory, skipping symlinks.
///
/// # Errors
/// Returns an error if any entry cannot be read or written.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        if ty.is_dir() {
            copy_dir_all(&entry.path(), &dst.join(entry.file_name()))?;
        } else if ty.is_file() {
            fs::copy(entry.path(), dst.join(entry.file_name()))?;
        }
    }

    Ok(())
}

/// Compute the path of `to` relative to the directory `from_dir`.
///
/// Both paths must be absolute (or both relative to the same base). Returns
/// `None` when they live on different prefixes (e.g. Windows drives).
#[must_use]
pub fn relative_path(from_dir: &Path, to: &Path) -> Option<PathBuf> {
    let from_norm = normalize(from_dir);
    let to_norm = normalize(to);
    let from: Vec<Component<'_>> = from_norm.components().collect();
    let to: Vec<Component<'_>> = to_norm.components().collect();

    if from.first() != to.first() {
        return None;
    }

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut result = PathBuf::new();
    for _ in common..from.len() {
        result.push("..");
    }
    for component in &to[common..] {
        result.push(component.as_os_str());
    }
    Some(result)
}

/// Lexically remove `.` and resolve `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
