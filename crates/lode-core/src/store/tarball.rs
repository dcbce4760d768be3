//! Tarball download and extraction into the store.

use super::StoreError;
use bytes::Bytes;
use flate2::read::GzDecoder;
use reqwest::Client;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tar::Archive;

/// Maximum tarball size (200 MB).
pub const MAX_TARBALL_SIZE: u64 = 200 * 1024 * 1024;

const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

fn download_err(url: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Download {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Download a tarball.
///
/// # Errors
/// Returns an error if the request fails, the registry answers with a
/// non-success status or the body exceeds `max_bytes`.
pub async fn download_tarball(
    client: &Client,
    url: &str,
    max_bytes: u64,
) -> Result<Bytes, StoreError> {
    let response = client
        .get(url)
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| download_err(url, e.to_string()))?;

    if !response.status().is_success() {
        return Err(download_err(url, format!("status {}", response.status())));
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(download_err(
                url,
                format!("tarball too large: {len} bytes (max: {max_bytes})"),
            ));
        }
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_err(url, format!("failed to read body: {e}")))?;

    if bytes.len() as u64 > max_bytes {
        return Err(download_err(
            url,
            format!("tarball too large: {} bytes (max: {max_bytes})", bytes.len()),
        ));
    }

    Ok(bytes)
}

/// Extract a gzipped tarball so that its single root directory becomes
/// `dest`.
///
/// Extraction goes to a temporary sibling of `dest` first and is renamed
/// into place, so `dest` is either absent or complete. If `dest` appears
/// meanwhile (another fetch of the same package won), that copy is kept.
///
/// # Errors
/// Returns an error if the archive is corrupt, has an unexpected layout or
/// contains entries escaping the destination.
pub fn extract_tgz_atomic(bytes: &[u8], dest: &Path) -> Result<(), StoreError> {
    let parent = dest
        .parent()
        .ok_or_else(|| StoreError::Extract(format!("{} has no parent", dest.display())))?;
    fs::create_dir_all(parent).map_err(StoreError::io("failed to create", parent))?;

    if dest.exists() {
        return Ok(());
    }

    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(parent)
        .map_err(StoreError::io("failed to create staging dir in", parent))?;

    extract_tgz_to(bytes, staging.path())?;
    let root = find_extracted_root(staging.path())?;

    match fs::rename(&root, dest) {
        Ok(()) => Ok(()),
        Err(_) if dest.exists() => Ok(()),
        Err(rename_err) => lode_util::fs::copy_dir_all(&root, dest).map_err(|copy_err| {
            StoreError::Extract(format!(
                "failed to move extracted package: rename={rename_err}, copy={copy_err}"
            ))
        }),
    }
}

/// The single top-level directory of an extracted tarball.
///
/// Usually `package/`, but some packages (`@types/*` among them) use other
/// names.
fn find_extracted_root(staging: &Path) -> Result<PathBuf, StoreError> {
    let package_dir = staging.join("package");
    if package_dir.is_dir() {
        return Ok(package_dir);
    }

    let dirs: Vec<PathBuf> = fs::read_dir(staging)
        .map_err(StoreError::io("failed to read", staging))?
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_type().is_ok_and(|ft| ft.is_dir())
                && !e.file_name().to_string_lossy().starts_with('.')
        })
        .map(|e| e.path())
        .collect();

    match dirs.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(StoreError::Extract(
            "tarball does not contain a top-level directory".to_string(),
        )),
        many => Err(StoreError::Extract(format!(
            "tarball contains {} top-level directories, expected 1",
            many.len()
        ))),
    }
}

fn extract_tgz_to(bytes: &[u8], dest: &Path) -> Result<(), StoreError> {
    let extract_err = |what: &str, e: io::Error| StoreError::Extract(format!("{what}: {e}"));

    let mut archive = Archive::new(GzDecoder::new(bytes));
    let entries = archive
        .entries()
        .map_err(|e| extract_err("failed to read tarball entries", e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| extract_err("failed to read tarball entry", e))?;
        let path = entry
            .path()
            .map_err(|e| extract_err("failed to read entry path", e))?
            .into_owned();

        if path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(StoreError::Extract(format!(
                "tarball entry escapes destination: {}",
                path.display()
            )));
        }

        let dest_path = dest.join(&path);
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::io("failed to create", parent))?;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path).map_err(StoreError::io("failed to create", &dest_path))?;
        } else if entry_type.is_file() {
            let mut file =
                File::create(&dest_path).map_err(StoreError::io("failed to create", &dest_path))?;
            io::copy(&mut entry, &mut file).map_err(StoreError::io("failed to write", &dest_path))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(mode) = entry.header().mode() {
                    let _ = fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode));
                }
            }
        }
        // Links and special entries are not extracted
    }

    Ok(())
}
