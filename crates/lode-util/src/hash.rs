use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::fs::list_files;

/// Compute the BLAKE3 hash of a file, returning the hex-encoded digest.
///
/// Streams the file content to minimize memory usage.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn blake3_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash every regular file below `root`.
///
/// Keys are `/`-separated paths relative to `root`, values are BLAKE3 hex
/// digests. The map is ordered, so two trees with the same content always
/// produce the same map.
///
/// # Errors
/// Returns an error if the tree cannot be walked or a file cannot be read.
pub fn hash_tree(root: &Path) -> io::Result<BTreeMap<String, String>> {
    let mut index = BTreeMap::new();
    for rel in list_files(root)? {
        let digest = blake3_file(&root.join(&rel))?;
        index.insert(rel, digest);
    }
    Ok(index)
}

/// Check that every file recorded in `index` still exists below `root` with
/// the recorded digest.
///
/// Extra files on disk are ignored. A missing or unreadable file counts as a
/// mismatch rather than an error.
#[must_use]
pub fn tree_matches(root: &Path, index: &BTreeMap<String, String>) -> bool {
    index.iter().all(|(rel, expected)| {
        blake3_file(&root.join(rel)).is_ok_and(|actual| &actual == expected)
    })
}
