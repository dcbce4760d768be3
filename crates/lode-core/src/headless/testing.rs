//! In-memory store double for install tests.

use crate::store::{
    FetchHandle, FetchRequest, FetchResponse, ImportRequest, PackageFilesResponse,
    StoreController, StoreError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Serves registered packages from `<root>/<pkg_id>/node_modules/<name>`.
///
/// Unregistered packages fetch as empty file sets without touching disk.
pub(crate) struct FakeStore {
    root: PathBuf,
    packages: BTreeMap<String, (String, Vec<(String, String)>)>,
    engine_caches: BTreeMap<String, Vec<String>>,
    failing: BTreeSet<String>,
    imports: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            packages: BTreeMap::new(),
            engine_caches: BTreeMap::new(),
            failing: BTreeSet::new(),
            imports: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_package(mut self, pkg_id: &str, name: &str, files: &[(&str, &str)]) -> Self {
        let files = files
            .iter()
            .map(|(path, content)| ((*path).to_string(), (*content).to_string()))
            .collect();
        self.packages
            .insert(pkg_id.to_string(), (name.to_string(), files));
        self
    }

    pub(crate) fn with_engine_cache(mut self, pkg_id: &str, engine: &str) -> Self {
        self.engine_caches
            .entry(pkg_id.to_string())
            .or_default()
            .push(engine.to_string());
        self
    }

    pub(crate) fn failing(mut self, pkg_id: &str) -> Self {
        self.failing.insert(pkg_id.to_string());
        self
    }

    /// `(from, to)` of every import so far.
    pub(crate) fn imports(&self) -> Vec<(PathBuf, PathBuf)> {
        self.imports.lock().unwrap().clone()
    }
}

impl StoreController for FakeStore {
    fn fetch_package(&self, request: FetchRequest) -> Result<FetchResponse, StoreError> {
        let in_store_location = self.root.join(&request.pkg_id);

        if self.failing.contains(&request.pkg_id) {
            return Ok(FetchResponse {
                in_store_location,
                fetching_files: FetchHandle::ready(Err(StoreError::Download {
                    url: request.pkg_id,
                    reason: "unreachable".to_string(),
                })),
            });
        }

        let mut files = Vec::new();
        if let Some((name, contents)) = self.packages.get(&request.pkg_id) {
            let dir = in_store_location.join("node_modules").join(name);
            for (rel, content) in contents {
                let path = dir.join(rel);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, content).unwrap();
                files.push(rel.clone());
            }
        }

        Ok(FetchResponse {
            in_store_location,
            fetching_files: FetchHandle::ready(Ok(PackageFilesResponse {
                from_store: false,
                files,
            })),
        })
    }

    fn import_package(
        &self,
        from: &Path,
        to: &Path,
        request: ImportRequest,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.imports
            .lock()
            .unwrap()
            .push((from.to_path_buf(), to.to_path_buf()));

        let result = if from == to {
            Ok(())
        } else {
            copy_files(from, to, &request.files.files)
        };
        async move { result }
    }

    fn cache_by_engine(&self, pkg_id: &str) -> Result<BTreeMap<String, PathBuf>, StoreError> {
        let location = self.root.join(pkg_id).join("side_effects");
        Ok(self
            .engine_caches
            .get(pkg_id)
            .into_iter()
            .flatten()
            .map(|engine| (engine.clone(), location.join(engine).join("package")))
            .collect())
    }
}

fn copy_files(from: &Path, to: &Path, files: &[String]) -> Result<(), StoreError> {
    fs::create_dir_all(to).map_err(StoreError::io("failed to create", to))?;
    for rel in files {
        let dst = to.join(rel);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(StoreError::io("failed to create", parent))?;
        }
        fs::copy(from.join(rel), &dst).map_err(StoreError::io("failed to copy", &dst))?;
    }
    Ok(())
}
