//! Headless install: materialize a lockfile into `node_modules` without
//! resolving anything.
//!
//! The run is split in two phases. First every package is imported from the
//! store while, concurrently, each package's dependencies are linked into
//! its private `node_modules`. Once both are done, executables are exposed.

pub mod bins;
pub mod graph;
pub mod import;
pub mod limit;
pub mod modules;

#[cfg(test)]
pub(crate) mod testing;

pub use bins::link_all_bins;
pub use graph::{build_dep_graph, DepGraph, DepGraphNode, GraphOptions};
pub use import::{import_all, ImportOptions};
pub use limit::{LinkLimiter, LINK_CONCURRENCY};
pub use modules::link_all_modules;

use crate::config::InstallOptions;
use crate::error::{Error, Result};
use crate::pkg::filter::{filter_lockfile, FilterOptions};
use crate::pkg::lockfile::{read_wanted, LOCKFILE_NAME};
use crate::store::StoreController;
use std::path::Path;
use tracing::{debug, info};

/// Summary of a finished install.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct InstallSummary {
    /// Packages materialized.
    pub packages: usize,
    /// Packages used in place from the store.
    pub independent: usize,
}

/// Install the lockfile found in `opts.prefix` using `store`.
///
/// # Errors
/// Fails if the prefix is unusable, the lockfile is missing or invalid, or
/// any fetch, import or link fails. Nothing is rolled back.
pub async fn headless_install<S: StoreController>(
    opts: &InstallOptions,
    store: &S,
) -> Result<InstallSummary> {
    validate_prefix(&opts.prefix)?;

    let lockfile = read_wanted(&opts.prefix)?.ok_or_else(|| Error::LockfileRequired {
        prefix: opts.prefix.clone(),
        lockfile: LOCKFILE_NAME,
    })?;

    let filter = FilterOptions::from_includes(opts.development, opts.optional, opts.production);
    let filtered = filter_lockfile(&lockfile, filter);
    debug!(
        locked = lockfile.packages.len(),
        kept = filtered.packages.len(),
        "Filtered lockfile"
    );

    let graph = build_dep_graph(
        &filtered,
        &GraphOptions {
            prefix: opts.prefix.clone(),
            verify_store_integrity: opts.verify_store_integrity,
            force: opts.force,
            independent_leaves: opts.independent_leaves,
            engine: opts.engine.clone(),
        },
        store,
    )?;

    let limiter = LinkLimiter::default();
    let import_opts = ImportOptions {
        force: opts.force,
        side_effects_cache: opts.side_effects_cache,
    };
    tokio::try_join!(
        import_all(store, &graph, import_opts),
        link_all_modules(&graph, opts.optional, &limiter),
    )?;
    link_all_bins(&graph, opts.optional, &limiter).await?;

    let summary = InstallSummary {
        packages: graph.len(),
        independent: graph.nodes().filter(|node| node.independent).count(),
    };
    info!(
        packages = summary.packages,
        independent = summary.independent,
        "Installed from lockfile"
    );
    Ok(summary)
}

fn validate_prefix(prefix: &Path) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidPrefix {
        path: prefix.to_path_buf(),
        reason: reason.to_string(),
    };
    if !prefix.is_absolute() {
        return Err(invalid("must be an absolute path"));
    }
    if !prefix.is_dir() {
        return Err(invalid("not a directory"));
    }
    Ok(())
}

/// Run filesystem work off the async worker threads.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Task(e.to_string()))?
}
