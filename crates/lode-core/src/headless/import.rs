//! Importing fetched packages into their private locations.

use super::graph::{DepGraph, DepGraphNode};
use crate::error::{Error, Result};
use crate::store::{ImportRequest, StoreController};
use futures::future::try_join_all;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Overwrite already imported packages.
    pub force: bool,
    pub side_effects_cache: bool,
}

/// Import every node of `graph`, independent ones included.
///
/// Each node's fetch handle is consumed here. Imports are not limited; the
/// first failure cancels the rest.
///
/// # Errors
/// Returns the first fetch or import failure, or [`Error::FetchConsumed`]
/// if a node's files were already taken.
pub async fn import_all<S: StoreController>(
    store: &S,
    graph: &DepGraph,
    opts: ImportOptions,
) -> Result<()> {
    try_join_all(
        graph
            .iter()
            .map(|(dep_path, node)| import_node(store, dep_path, node, opts)),
    )
    .await?;
    Ok(())
}

async fn import_node<S: StoreController>(
    store: &S,
    dep_path: &str,
    node: &DepGraphNode,
    opts: ImportOptions,
) -> Result<()> {
    let pending = node
        .fetching_files
        .take()
        .ok_or_else(|| Error::FetchConsumed {
            dep_path: dep_path.to_string(),
        })?;
    let files = pending.wait().await.map_err(Error::store(&node.pkg_id))?;

    store
        .import_package(
            &node.central_location,
            &node.peripheral_location,
            ImportRequest {
                files,
                force: opts.force,
                side_effects_cache: opts.side_effects_cache,
            },
        )
        .await
        .map_err(Error::store(&node.pkg_id))?;

    debug!(pkg = %node.pkg_id, to = %node.peripheral_location.display(), "Imported");
    Ok(())
}
