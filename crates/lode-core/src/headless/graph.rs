//! Dependency graph built from a (filtered) lockfile.
//!
//! Nodes are keyed by canonical (absolute) dependency path. Children are
//! referenced by key, so the graph is a plain owned table.

use crate::error::{Error, Result};
use crate::pkg::dep_path;
use crate::pkg::lockfile::{Lockfile, PackageSnapshot};
use crate::pkg::resolution;
use crate::store::{FetchHandle, FetchRequest, StoreController};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One package instance of the install.
#[derive(Debug, Serialize)]
pub struct DepGraphNode {
    pub name: String,
    pub pkg_id: String,
    /// Store-owned directory with the package files.
    pub central_location: PathBuf,
    /// Project-private directory the package is imported to. Equals
    /// `central_location` for independent nodes.
    pub peripheral_location: PathBuf,
    /// The node's private `node_modules`, holding the package itself and
    /// links to its dependencies.
    pub modules: PathBuf,
    /// alias -> dependency path, regular and optional dependencies merged.
    pub children: BTreeMap<String, String>,
    /// Aliases in `children` that are optional.
    pub optional_dependencies: BTreeSet<String>,
    /// Used in place from the store, never linked into.
    pub independent: bool,
    pub has_bundled_dependencies: bool,
    #[serde(skip)]
    pub fetching_files: FetchHandle,
}

impl DepGraphNode {
    /// `(alias, dep_path)` of the children to link; optional ones only if
    /// `include_optional`.
    pub fn children_to_link(
        &self,
        include_optional: bool,
    ) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.children
            .iter()
            .filter(move |(alias, _)| {
                include_optional || !self.optional_dependencies.contains(*alias)
            })
            .map(|(alias, dep_path)| (alias.as_str(), dep_path.as_str()))
    }
}

/// All nodes of an install, by dependency path.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct DepGraph {
    nodes: BTreeMap<String, DepGraphNode>,
}

impl DepGraph {
    #[must_use]
    pub fn get(&self, dep_path: &str) -> Option<&DepGraphNode> {
        self.nodes.get(dep_path)
    }

    /// Look up a node that must exist.
    ///
    /// # Errors
    /// Returns [`Error::MissingDependency`] when no node has that path.
    pub fn node(&self, dep_path: &str) -> Result<&DepGraphNode> {
        self.get(dep_path).ok_or_else(|| Error::MissingDependency {
            dep_path: dep_path.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DepGraphNode)> {
        self.nodes.iter()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DepGraphNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn insert(&mut self, dep_path: String, node: DepGraphNode) {
        self.nodes.insert(dep_path, node);
    }
}

/// Inputs of [`build_dep_graph`] besides the lockfile.
#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub prefix: PathBuf,
    pub verify_store_integrity: bool,
    /// Ignore side-effect caches.
    pub force: bool,
    pub independent_leaves: bool,
    /// Engine name selecting a side-effect cache.
    pub engine: String,
}

/// Build the graph of every package in `lockfile` and start fetching each
/// package.
///
/// Fetches run on the tokio runtime; this must be called from within one.
///
/// # Errors
/// Fails on the first malformed dependency path, package without a name or
/// store error. Fetches already started are aborted when the partial graph
/// is dropped.
pub fn build_dep_graph<S: StoreController>(
    lockfile: &Lockfile,
    opts: &GraphOptions,
    store: &S,
) -> Result<DepGraph> {
    let node_modules = crate::paths::node_modules(&opts.prefix);
    let mut graph = DepGraph::default();

    for (rel_dep_path, snapshot) in &lockfile.packages {
        let dep_path = dep_path::resolve(&lockfile.registry, rel_dep_path)?;
        let name = package_name(rel_dep_path, snapshot)?;
        let pkg_id = snapshot.id.clone().unwrap_or_else(|| dep_path.clone());
        let resolution = resolution::from_snapshot(rel_dep_path, snapshot, &lockfile.registry)?;
        let independent = opts.independent_leaves && snapshot.is_leaf();

        let response = store
            .fetch_package(FetchRequest {
                pkg_id: pkg_id.clone(),
                name: name.clone(),
                resolution,
                prefix: opts.prefix.clone(),
                verify_store_integrity: opts.verify_store_integrity,
                force: false,
            })
            .map_err(Error::store(&pkg_id))?;

        let cached = if opts.force {
            None
        } else {
            store
                .cache_by_engine(&pkg_id)
                .map_err(Error::store(&pkg_id))?
                .remove(&opts.engine)
        };
        if cached.is_some() {
            debug!(pkg = %pkg_id, engine = %opts.engine, "Using side-effect cache");
        }
        let central_location = cached.unwrap_or_else(|| {
            join_slashed(&response.in_store_location.join("node_modules"), &name)
        });

        let modules = modules_dir(&node_modules, &dep_path);
        let peripheral_location = if independent {
            central_location.clone()
        } else {
            join_slashed(&modules, &name)
        };

        let mut children = BTreeMap::new();
        // Optional entries override regular ones with the same alias
        for (alias, reference) in snapshot
            .dependencies
            .iter()
            .chain(&snapshot.optional_dependencies)
        {
            match dep_path::ref_to_absolute(reference, alias, &lockfile.registry)? {
                Some(child) => {
                    children.insert(alias.clone(), child);
                }
                None => {
                    children.remove(alias);
                }
            }
        }

        graph.insert(
            dep_path,
            DepGraphNode {
                name,
                pkg_id,
                central_location,
                peripheral_location,
                modules,
                children,
                optional_dependencies: snapshot.optional_dependencies.keys().cloned().collect(),
                independent,
                has_bundled_dependencies: snapshot.has_bundled_dependencies(),
                fetching_files: response.fetching_files,
            },
        );
    }

    debug!(nodes = graph.len(), "Built dependency graph");
    Ok(graph)
}

fn package_name(rel_dep_path: &str, snapshot: &PackageSnapshot) -> Result<String> {
    if let Some(name) = &snapshot.name {
        return Ok(name.clone());
    }
    dep_path::parse(rel_dep_path)?
        .name
        .ok_or_else(|| Error::MissingPackageName {
            dep_path: rel_dep_path.to_string(),
        })
}

/// `<node_modules>/.<dep_path>/node_modules`.
///
/// `:` is not allowed in Windows file names and becomes `+`. Paths with `.`
/// or `..` segments are flattened into one directory name so they stay
/// inside `node_modules`.
fn modules_dir(node_modules: &Path, dep_path: &str) -> PathBuf {
    let escaped = dep_path.replace(':', "+");
    let dir = if escaped.split('/').any(|s| s == "." || s == "..") {
        node_modules.join(format!(".{}", escaped.replace('/', "+")))
    } else {
        join_slashed(node_modules, &format!(".{escaped}"))
    };
    dir.join("node_modules")
}

/// Join a `/`-separated relative path segment by segment.
pub(crate) fn join_slashed(base: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|s| !s.is_empty())
        .fold(base.to_path_buf(), |path, segment| path.join(segment))
}
