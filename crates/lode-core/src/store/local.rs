//! The on-disk store.
//!
//! One entry per package id below the store root:
//!
//! ```text
//! <root>/<pkg-id>/
//!   node_modules/<name>/             package files
//!   integrity.json                   BLAKE3 index of those files
//!   side_effects/<engine>/package/   files after build scripts ran
//! ```

use super::{
    integrity, tarball, FetchHandle, FetchRequest, FetchResponse, ImportRequest,
    PackageFilesResponse, StoreController, StoreError,
};
use crate::pkg::resolution::Resolution;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// File index of a stored package, relative to the entry.
pub const INDEX_FILE: &str = "integrity.json";

/// Directory holding per-engine side-effect caches, relative to the entry.
pub const SIDE_EFFECTS_DIR: &str = "side_effects";

const SIDE_EFFECTS_PACKAGE_DIR: &str = "package";

type SharedFetch = Shared<BoxFuture<'static, Result<PackageFilesResponse, Arc<StoreError>>>>;

/// A store rooted at a local directory.
///
/// Concurrent fetches of one package id share a single transfer; clones
/// share the in-flight table.
#[derive(Clone)]
pub struct LocalStore {
    root: PathBuf,
    http: Client,
    in_flight: Arc<Mutex<HashMap<String, SharedFetch>>>,
}

impl fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("lode/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Client(e.to_string()))?;
        Ok(Self {
            root: root.into(),
            http,
            in_flight: Arc::default(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The store entry of `pkg_id`.
    ///
    /// `:` becomes `+`. Ids carrying relative paths (local packages) are
    /// flattened into a single directory name so the entry never leaves the
    /// store root.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidLocation`] for an empty id.
    pub fn package_location(&self, pkg_id: &str) -> Result<PathBuf, StoreError> {
        let escaped = pkg_id.replace([':', '\\'], "+");
        let segments: Vec<&str> = escaped.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(StoreError::InvalidLocation(pkg_id.to_string()));
        }
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Ok(self.root.join(segments.join("+")));
        }
        Ok(segments.iter().fold(self.root.clone(), |path, s| path.join(s)))
    }
}

impl LocalStore {
    /// The transfer of `request.pkg_id`, joining one already in flight.
    ///
    /// The entry leaves the table once its transfer finishes; later requests
    /// then find the package through the store index.
    fn shared_fetch(&self, entry: PathBuf, target: PathBuf, request: FetchRequest) -> SharedFetch {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let pending = in_flight.get(&request.pkg_id).cloned();
        if let Some(pending) = pending {
            debug!(pkg = %request.pkg_id, "Joining in-flight fetch");
            return pending;
        }

        debug!(pkg = %request.pkg_id, "Fetching package");
        let key = request.pkg_id.clone();
        let done_key = key.clone();
        let table = Arc::clone(&self.in_flight);
        let fetch = fetch_into_store(self.http.clone(), entry, target, request);
        let pending = async move {
            let result = fetch.await.map_err(Arc::new);
            table
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&done_key);
            result
        }
        .boxed()
        .shared();
        in_flight.insert(key, pending.clone());
        pending
    }
}

impl StoreController for LocalStore {
    fn fetch_package(&self, request: FetchRequest) -> Result<FetchResponse, StoreError> {
        if !is_valid_package_name(&request.name) {
            return Err(StoreError::InvalidLocation(request.name));
        }
        let in_store_location = self.package_location(&request.pkg_id)?;
        let target = in_store_location.join("node_modules").join(&request.name);

        let fetch = self.shared_fetch(in_store_location.clone(), target, request);
        let fetching_files = FetchHandle::spawn(async move {
            fetch
                .await
                .map_err(|e| Arc::try_unwrap(e).unwrap_or_else(StoreError::Shared))
        });

        Ok(FetchResponse {
            in_store_location,
            fetching_files,
        })
    }

    fn import_package(
        &self,
        from: &Path,
        to: &Path,
        request: ImportRequest,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        let from = from.to_path_buf();
        let to = to.to_path_buf();
        async move { blocking(move || import_files(&from, &to, &request)).await }
    }

    fn cache_by_engine(&self, pkg_id: &str) -> Result<BTreeMap<String, PathBuf>, StoreError> {
        let dir = self.package_location(pkg_id)?.join(SIDE_EFFECTS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StoreError::io("failed to read", &dir)(e)),
        };

        let mut caches = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::io("failed to read", &dir))?;
            let package = entry.path().join(SIDE_EFFECTS_PACKAGE_DIR);
            if package.is_dir() {
                caches.insert(entry.file_name().to_string_lossy().into_owned(), package);
            }
        }
        Ok(caches)
    }
}

/// `name` or `@scope/name`, without path tricks.
fn is_valid_package_name(name: &str) -> bool {
    let components: Vec<Component<'_>> = Path::new(name).components().collect();
    let all_normal = components.iter().all(|c| matches!(c, Component::Normal(_)));
    match components.len() {
        1 => all_normal && !name.starts_with('@'),
        2 => all_normal && name.starts_with('@'),
        _ => false,
    }
}

async fn blocking<T, F>(work: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

async fn fetch_into_store(
    http: Client,
    entry: PathBuf,
    target: PathBuf,
    request: FetchRequest,
) -> Result<PackageFilesResponse, StoreError> {
    let index_path = entry.join(INDEX_FILE);

    // Local directories may change between runs; always recopy them
    let reusable = !matches!(request.resolution, Resolution::Directory { .. });
    if reusable && !request.force {
        let (target, index_path) = (target.clone(), index_path.clone());
        let verify = request.verify_store_integrity;
        if let Some(files) = blocking(move || stored_files(&target, &index_path, verify)).await? {
            debug!(pkg = %request.pkg_id, "Found package in store");
            return Ok(PackageFilesResponse {
                from_store: true,
                files,
            });
        }
    }

    match &request.resolution {
        Resolution::Tarball {
            tarball: url,
            integrity: expected,
            ..
        } => {
            let bytes = if let Some(path) = url.strip_prefix("file:") {
                let path = request.prefix.join(path);
                let content = tokio::fs::read(&path)
                    .await
                    .map_err(StoreError::io("failed to read", &path))?;
                Bytes::from(content)
            } else {
                debug!(pkg = %request.pkg_id, url = %url, "Downloading tarball");
                tarball::download_tarball(&http, url, tarball::MAX_TARBALL_SIZE).await?
            };

            let expected = expected.clone();
            let (target, index_path) = (target.clone(), index_path.clone());
            blocking(move || {
                if let Some(expected) = &expected {
                    integrity::verify(&bytes, expected)?;
                }
                clear_entry(&target, &index_path)?;
                tarball::extract_tgz_atomic(&bytes, &target)
            })
            .await?;
        }
        Resolution::Directory { directory } => {
            let src = request.prefix.join(directory);
            let (target, index_path) = (target.clone(), index_path.clone());
            blocking(move || {
                clear_entry(&target, &index_path)?;
                copy_package_dir(&src, &target)
            })
            .await?;
        }
        Resolution::Git { repo, commit } => {
            return Err(StoreError::UnsupportedResolution(format!(
                "git {repo}#{commit}"
            )));
        }
    }

    let files = blocking(move || {
        crate::pkg::bins::mark_executable(&target).map_err(|e| StoreError::Io {
            context: "failed to make executable",
            path: e.path().to_path_buf(),
            source: io::Error::other(e.to_string()),
        })?;
        write_index(&target, &index_path)
    })
    .await?;
    Ok(PackageFilesResponse {
        from_store: false,
        files,
    })
}

/// Files of an already stored package, or `None` if it has to be fetched.
fn stored_files(
    target: &Path,
    index_path: &Path,
    verify: bool,
) -> Result<Option<Vec<String>>, StoreError> {
    let raw = match fs::read(index_path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io("failed to read", index_path)(e)),
    };
    let Ok(index) = serde_json::from_slice::<BTreeMap<String, String>>(&raw) else {
        warn!(index = %index_path.display(), "Corrupt store index, refetching");
        return Ok(None);
    };
    if !target.is_dir() {
        return Ok(None);
    }
    if verify && !lode_util::hash::tree_matches(target, &index) {
        warn!(pkg = %target.display(), "Stored files don't match their index, refetching");
        return Ok(None);
    }
    Ok(Some(index.into_keys().collect()))
}

/// Remove a previous (possibly partial) copy of a package.
fn clear_entry(target: &Path, index_path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(index_path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            return Err(StoreError::io("failed to remove", index_path)(e));
        }
        _ => {}
    }
    remove_entry(target).map_err(StoreError::io("failed to remove", target))
}

fn remove_entry(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Copy a local package, leaving out its own `node_modules`.
fn copy_package_dir(src: &Path, dst: &Path) -> Result<(), StoreError> {
    let files = lode_util::fs::list_files(src).map_err(StoreError::io("failed to read", src))?;
    fs::create_dir_all(dst).map_err(StoreError::io("failed to create", dst))?;
    for rel in files.iter().filter(|f| !f.starts_with("node_modules/")) {
        let to = dst.join(rel);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(StoreError::io("failed to create", parent))?;
        }
        fs::copy(src.join(rel), &to).map_err(StoreError::io("failed to copy", &to))?;
    }
    Ok(())
}

fn write_index(target: &Path, index_path: &Path) -> Result<Vec<String>, StoreError> {
    let index =
        lode_util::hash::hash_tree(target).map_err(StoreError::io("failed to hash", target))?;
    let json = serde_json::to_vec_pretty(&index)
        .map_err(io::Error::from)
        .map_err(StoreError::io("failed to serialize", index_path))?;
    lode_util::fs::atomic_write(index_path, &json)
        .map_err(StoreError::io("failed to write", index_path))?;
    Ok(index.into_keys().collect())
}

fn import_files(from: &Path, to: &Path, request: &ImportRequest) -> Result<(), StoreError> {
    if from == to {
        return Ok(());
    }
    if !request.force && fs::symlink_metadata(to).is_ok() {
        debug!(to = %to.display(), "Already imported");
        return Ok(());
    }

    // A side-effect cache holds more than the fetched index lists
    let listed;
    let files = if from.components().any(|c| c.as_os_str() == SIDE_EFFECTS_DIR) {
        listed = lode_util::fs::list_files(from).map_err(StoreError::io("failed to read", from))?;
        &listed
    } else {
        &request.files.files
    };

    let parent = to
        .parent()
        .ok_or_else(|| StoreError::InvalidLocation(to.display().to_string()))?;
    fs::create_dir_all(parent).map_err(StoreError::io("failed to create", parent))?;
    let staging = tempfile::Builder::new()
        .prefix(".import-")
        .tempdir_in(parent)
        .map_err(StoreError::io("failed to create staging dir in", parent))?;

    for rel in files {
        let src = from.join(rel);
        let dst = staging.path().join(rel);
        let copied = if request.side_effects_cache {
            dst.parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::copy(&src, &dst).map(|_| ()))
        } else {
            lode_util::fs::link_or_copy_file(&src, &dst)
        };
        copied.map_err(StoreError::io("failed to import", &src))?;
    }

    remove_entry(to).map_err(StoreError::io("failed to remove", to))?;
    fs::rename(staging.path(), to).map_err(StoreError::io("failed to move into", to))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tarball::tests::tgz;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _tmp: TempDir,
        prefix: PathBuf,
        store: LocalStore,
    }

    fn fixture() -> Fixture {
        let tmp = tempdir().unwrap();
        let prefix = tmp.path().join("project");
        fs::create_dir_all(&prefix).unwrap();
        let store = LocalStore::new(tmp.path().join("store")).unwrap();
        Fixture {
            _tmp: tmp,
            prefix,
            store,
        }
    }

    fn request(fx: &Fixture, pkg_id: &str, name: &str, resolution: Resolution) -> FetchRequest {
        FetchRequest {
            pkg_id: pkg_id.to_string(),
            name: name.to_string(),
            resolution,
            prefix: fx.prefix.clone(),
            verify_store_integrity: false,
            force: false,
        }
    }

    async fn fetch(store: &LocalStore, req: FetchRequest) -> Result<(PathBuf, PackageFilesResponse), StoreError> {
        let response = store.fetch_package(req)?;
        let files = response.fetching_files.take().unwrap().wait().await?;
        Ok((response.in_store_location, files))
    }

    fn write_tarball(fx: &Fixture, file: &str) -> (String, String) {
        let bytes = tgz(&[
            ("package/package.json", r#"{"name":"is-odd","version":"1.0.0"}"#),
            ("package/index.js", "module.exports = n => n % 2 === 1;"),
        ]);
        fs::write(fx.prefix.join(file), &bytes).unwrap();
        (
            format!("file:{file}"),
            integrity::compute("sha512", &bytes).unwrap(),
        )
    }

    fn tarball_resolution(url: &str, integrity: Option<String>) -> Resolution {
        Resolution::Tarball {
            tarball: url.to_string(),
            integrity,
            registry: "https://registry.npmjs.org/".to_string(),
        }
    }

    #[test]
    fn test_package_location() {
        let store = LocalStore::new("/store").unwrap();
        assert_eq!(
            store
                .package_location("registry.npmjs.org/@scope/pkg/1.0.0")
                .unwrap(),
            PathBuf::from("/store/registry.npmjs.org/@scope/pkg/1.0.0")
        );
        assert_eq!(
            store.package_location("localhost:4873/a/1.0.0").unwrap(),
            PathBuf::from("/store/localhost+4873/a/1.0.0")
        );
        assert_eq!(
            store.package_location("file:../local").unwrap(),
            PathBuf::from("/store/file+..+local")
        );
        assert!(store.package_location("").is_err());
    }

    #[tokio::test]
    async fn test_directory_resolution_fetch_and_import() {
        let fx = fixture();
        let local = fx.prefix.join("packages").join("util");
        fs::create_dir_all(local.join("lib")).unwrap();
        fs::create_dir_all(local.join("node_modules").join("junk")).unwrap();
        fs::write(local.join("package.json"), r#"{"name":"util"}"#).unwrap();
        fs::write(local.join("lib").join("index.js"), "").unwrap();
        fs::write(local.join("node_modules").join("junk").join("x.js"), "").unwrap();

        let req = request(
            &fx,
            "file:packages/util",
            "util",
            Resolution::Directory {
                directory: "packages/util".to_string(),
            },
        );
        let (in_store, files) = fetch(&fx.store, req).await.unwrap();

        assert!(!files.from_store);
        assert_eq!(files.files, vec!["lib/index.js", "package.json"]);

        let central = in_store.join("node_modules").join("util");
        let peripheral = fx.prefix.join("node_modules").join(".util").join("node_modules").join("util");
        fx.store
            .import_package(
                &central,
                &peripheral,
                ImportRequest {
                    files,
                    ..ImportRequest::default()
                },
            )
            .await
            .unwrap();

        assert!(peripheral.join("package.json").is_file());
        assert!(peripheral.join("lib").join("index.js").is_file());
        assert!(!peripheral.join("node_modules").exists());
    }

    #[tokio::test]
    async fn test_file_tarball_with_integrity_is_reused() {
        let fx = fixture();
        let (url, integrity) = write_tarball(&fx, "is-odd.tgz");
        let resolution = tarball_resolution(&url, Some(integrity));

        let (in_store, first) = fetch(&fx.store, request(&fx, "local/is-odd/1.0.0", "is-odd", resolution.clone()))
            .await
            .unwrap();
        assert!(!first.from_store);
        assert_eq!(first.files, vec!["index.js", "package.json"]);
        assert!(in_store.join(INDEX_FILE).is_file());

        let (_, second) = fetch(&fx.store, request(&fx, "local/is-odd/1.0.0", "is-odd", resolution))
            .await
            .unwrap();
        assert!(second.from_store);
        assert_eq!(second.files, first.files);
    }

    #[tokio::test]
    async fn test_integrity_mismatch_fails() {
        let fx = fixture();
        let (url, _) = write_tarball(&fx, "is-odd.tgz");
        let wrong = integrity::compute("sha512", b"something else").unwrap();

        let err = fetch(
            &fx.store,
            request(&fx, "local/is-odd/1.0.0", "is-odd", tarball_resolution(&url, Some(wrong))),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, StoreError::IntegrityMismatch { .. }));
        let target = fx
            .store
            .package_location("local/is-odd/1.0.0")
            .unwrap()
            .join("node_modules")
            .join("is-odd");
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_verify_store_integrity_refetches_tampered_files() {
        let fx = fixture();
        let (url, integrity) = write_tarball(&fx, "is-odd.tgz");
        let resolution = tarball_resolution(&url, Some(integrity));

        let (in_store, _) = fetch(&fx.store, request(&fx, "local/is-odd/1.0.0", "is-odd", resolution.clone()))
            .await
            .unwrap();
        let index_js = in_store.join("node_modules").join("is-odd").join("index.js");
        fs::write(&index_js, "tampered").unwrap();

        let mut req = request(&fx, "local/is-odd/1.0.0", "is-odd", resolution);
        req.verify_store_integrity = true;
        let (_, files) = fetch(&fx.store, req).await.unwrap();

        assert!(!files.from_store);
        assert_ne!(fs::read_to_string(&index_js).unwrap(), "tampered");
    }

    #[tokio::test]
    async fn test_git_resolution_unsupported() {
        let fx = fixture();
        let req = request(
            &fx,
            "github.com/org/repo/abc",
            "repo",
            Resolution::Git {
                repo: "https://github.com/org/repo".to_string(),
                commit: "abc".to_string(),
            },
        );
        let err = fetch(&fx.store, req).await.unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedResolution(_)));
    }

    #[tokio::test]
    async fn test_invalid_name_rejected() {
        let fx = fixture();
        let req = request(&fx, "x/1.0.0", "../escape", tarball_resolution("file:x.tgz", None));
        assert!(matches!(
            fx.store.fetch_package(req),
            Err(StoreError::InvalidLocation(_))
        ));
    }

    #[tokio::test]
    async fn test_import_same_path_and_existing_target() {
        let fx = fixture();
        let dir = fx.prefix.join("pkg");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.js"), "a").unwrap();

        fx.store
            .import_package(&dir, &dir, ImportRequest::default())
            .await
            .unwrap();
        assert!(dir.join("a.js").is_file());

        let to = fx.prefix.join("out");
        fs::create_dir_all(&to).unwrap();
        let files = PackageFilesResponse {
            from_store: true,
            files: vec!["a.js".to_string()],
        };
        fx.store
            .import_package(
                &dir,
                &to,
                ImportRequest {
                    files: files.clone(),
                    ..ImportRequest::default()
                },
            )
            .await
            .unwrap();
        assert!(!to.join("a.js").exists());

        fx.store
            .import_package(
                &dir,
                &to,
                ImportRequest {
                    files,
                    force: true,
                    side_effects_cache: false,
                },
            )
            .await
            .unwrap();
        assert!(to.join("a.js").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_side_effects_cache_import_copies() {
        use std::os::unix::fs::MetadataExt;

        let fx = fixture();
        let dir = fx.prefix.join("pkg");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.js"), "a").unwrap();
        let files = PackageFilesResponse {
            from_store: true,
            files: vec!["a.js".to_string()],
        };
        let ino = |p: &Path| fs::metadata(p).unwrap().ino();

        let linked = fx.prefix.join("linked");
        fx.store
            .import_package(
                &dir,
                &linked,
                ImportRequest {
                    files: files.clone(),
                    ..ImportRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(ino(&linked.join("a.js")), ino(&dir.join("a.js")));

        let copied = fx.prefix.join("copied");
        fx.store
            .import_package(
                &dir,
                &copied,
                ImportRequest {
                    files,
                    force: false,
                    side_effects_cache: true,
                },
            )
            .await
            .unwrap();
        assert_ne!(ino(&copied.join("a.js")), ino(&dir.join("a.js")));
    }

    #[test]
    fn test_cache_by_engine() {
        let fx = fixture();
        let entry = fx.store.package_location("registry.npmjs.org/native/1.0.0").unwrap();
        fs::create_dir_all(
            entry
                .join(SIDE_EFFECTS_DIR)
                .join("linux-x64-node-v20")
                .join(SIDE_EFFECTS_PACKAGE_DIR),
        )
        .unwrap();
        // Incomplete cache without a package directory
        fs::create_dir_all(entry.join(SIDE_EFFECTS_DIR).join("darwin-arm64-node-v18")).unwrap();

        let caches = fx
            .store
            .cache_by_engine("registry.npmjs.org/native/1.0.0")
            .unwrap();

        assert_eq!(caches.len(), 1);
        assert!(caches["linux-x64-node-v20"].ends_with("linux-x64-node-v20/package"));
        assert!(fx
            .store
            .cache_by_engine("registry.npmjs.org/other/1.0.0")
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetches_of_one_id_share_a_transfer() {
        let fx = fixture();
        let (url, sri) = write_tarball(&fx, "is-odd.tgz");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let req = request(
                    &fx,
                    "registry.npmjs.org/is-odd/1.0.0",
                    "is-odd",
                    tarball_resolution(&url, Some(sri.clone())),
                );
                fx.store.fetch_package(req).unwrap()
            })
            .collect();
        assert!(fx.store.in_flight.lock().unwrap().len() <= 1);

        for response in handles {
            let files = response.fetching_files.take().unwrap().wait().await.unwrap();
            assert_eq!(files.files, vec!["index.js", "package.json"]);
            assert!(response.in_store_location.join(INDEX_FILE).is_file());
        }
        assert!(fx.store.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shared_fetch_failure_reaches_every_request() {
        let fx = fixture();
        let (url, _) = write_tarball(&fx, "is-odd.tgz");
        let wrong = integrity::compute("sha512", b"something else").unwrap();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let req = request(
                    &fx,
                    "registry.npmjs.org/is-odd/1.0.0",
                    "is-odd",
                    tarball_resolution(&url, Some(wrong.clone())),
                );
                fx.store.fetch_package(req).unwrap()
            })
            .collect();

        for response in handles {
            let err = response.fetching_files.take().unwrap().wait().await.unwrap_err();
            assert!(err.to_string().contains("integrity check failed"), "{err}");
        }
    }
}
