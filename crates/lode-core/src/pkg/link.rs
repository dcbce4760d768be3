//! Directory symlinks (junctions on Windows) inside `node_modules`.

use std::fs;
use std::io;
use std::path::Path;

/// Point `link_path` at the directory `target`.
///
/// Missing parent directories of `link_path` (including `@scope`
/// directories) are created. Whatever currently occupies `link_path` is
/// replaced, unless it already is a link to `target`, in which case nothing
/// is touched. On Unix the link is relative so the tree survives being
/// moved as a whole.
///
/// # Errors
/// Returns an error if the parent cannot be created, the existing entry
/// cannot be removed or the link cannot be created.
pub fn symlink_dir(target: &Path, link_path: &Path) -> io::Result<()> {
    let parent = link_path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    let link_target = lode_util::fs::relative_path(parent, target)
        .unwrap_or_else(|| target.to_path_buf());

    if let Ok(existing) = fs::read_link(link_path) {
        if existing == link_target || existing == target {
            return Ok(());
        }
    }

    if fs::symlink_metadata(link_path).is_ok() {
        remove_link_or_dir(link_path)?;
    }

    create_dir_link(&link_target, target, link_path)
}

/// Remove a symlink, junction, file or directory.
fn remove_link_or_dir(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;

    #[cfg(unix)]
    {
        if metadata.file_type().is_symlink() {
            return fs::remove_file(path);
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;

        // FILE_ATTRIBUTE_REPARSE_POINT
        if metadata.file_attributes() & 0x400 != 0 {
            return fs::remove_dir(path).or_else(|_| fs::remove_file(path));
        }
    }

    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(unix)]
fn create_dir_link(link_target: &Path, _absolute: &Path, link_path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link_target, link_path)
}

#[cfg(windows)]
fn create_dir_link(_link_target: &Path, absolute: &Path, link_path: &Path) -> io::Result<()> {
    // Junctions need an absolute target but no privileges
    junction::create(absolute, link_path)
}

#[cfg(not(any(unix, windows)))]
fn create_dir_link(_link_target: &Path, absolute: &Path, link_path: &Path) -> io::Result<()> {
    lode_util::fs::copy_dir_all(absolute, link_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fake_package(root: &Path, name: &str) -> std::path::PathBuf {
        let dir = root.join("store").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), format!(r#"{{"name":"{name}"}}"#)).unwrap();
        dir
    }

    #[test]
    fn test_link_unscoped() {
        let tmp = tempdir().unwrap();
        let target = fake_package(tmp.path(), "react");
        let link = tmp.path().join("node_modules").join("react");

        symlink_dir(&target, &link).unwrap();

        assert!(link.join("package.json").exists());
        assert_eq!(
            fs::canonicalize(&link).unwrap(),
            fs::canonicalize(&target).unwrap()
        );
    }

    #[test]
    fn test_link_scoped_creates_scope_dir() {
        let tmp = tempdir().unwrap();
        let target = fake_package(tmp.path(), "node");
        let link = tmp.path().join("node_modules").join("@types").join("node");

        symlink_dir(&target, &link).unwrap();

        assert!(tmp.path().join("node_modules").join("@types").is_dir());
        assert!(link.join("package.json").exists());
    }

    #[test]
    fn test_link_replaces_existing_directory() {
        let tmp = tempdir().unwrap();
        let target = fake_package(tmp.path(), "react");
        let link = tmp.path().join("node_modules").join("react");
        fs::create_dir_all(&link).unwrap();
        fs::write(link.join("old.txt"), "old").unwrap();

        symlink_dir(&target, &link).unwrap();

        assert!(link.join("package.json").exists());
        assert!(!link.join("old.txt").exists());
    }

    #[test]
    fn test_link_retargets_existing_link() {
        let tmp = tempdir().unwrap();
        let first = fake_package(tmp.path(), "first");
        let second = fake_package(tmp.path(), "second");
        let link = tmp.path().join("node_modules").join("dep");

        symlink_dir(&first, &link).unwrap();
        symlink_dir(&second, &link).unwrap();

        assert_eq!(
            fs::canonicalize(&link).unwrap(),
            fs::canonicalize(&second).unwrap()
        );
    }

    #[test]
    fn test_link_idempotent() {
        let tmp = tempdir().unwrap();
        let target = fake_package(tmp.path(), "react");
        let link = tmp.path().join("node_modules").join("react");

        symlink_dir(&target, &link).unwrap();
        let before = fs::read_link(&link).unwrap();
        symlink_dir(&target, &link).unwrap();

        assert_eq!(fs::read_link(&link).unwrap(), before);
    }
}
