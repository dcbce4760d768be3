//! Linking each node's dependencies into its private `node_modules`.

use super::graph::{join_slashed, DepGraph, DepGraphNode};
use super::limit::LinkLimiter;
use crate::error::{Error, Result};
use crate::pkg::link::symlink_dir;
use futures::future::try_join_all;
use std::path::PathBuf;
use tracing::trace;

/// Link the children of every non-independent node.
///
/// `<node.modules>/<alias>` points at the child's peripheral location.
/// Optional children are skipped unless `include_optional`. Existing entries
/// are replaced, so running this twice yields the same tree.
///
/// # Errors
/// Returns [`Error::MissingDependency`] for a child that is not in the
/// graph, or the first link failure.
pub async fn link_all_modules(
    graph: &DepGraph,
    include_optional: bool,
    limiter: &LinkLimiter,
) -> Result<()> {
    let jobs = graph
        .nodes()
        .filter(|node| !node.independent)
        .map(|node| {
            limiter.run(async move {
                let links = planned_links(graph, node, include_optional)?;
                super::blocking(move || {
                    for (target, link) in &links {
                        trace!(link = %link.display(), target = %target.display(), "Linking");
                        symlink_dir(target, link).map_err(Error::link(link))?;
                    }
                    Ok(())
                })
                .await
            })
        });
    try_join_all(jobs).await?;
    Ok(())
}

/// `(target, link)` pairs of one node.
fn planned_links(
    graph: &DepGraph,
    node: &DepGraphNode,
    include_optional: bool,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    node.children_to_link(include_optional)
        .map(|(alias, dep_path)| {
            let child = graph.node(dep_path)?;
            Ok((
                child.peripheral_location.clone(),
                join_slashed(&node.modules, alias),
            ))
        })
        .collect()
}
