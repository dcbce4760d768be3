//! Exposing executables once every package is in place.

use super::graph::{join_slashed, DepGraph};
use super::limit::LinkLimiter;
use crate::error::Result;
use crate::pkg::bins::{link_bins, link_pkg_bins};
use futures::future::try_join_all;
use std::path::PathBuf;

/// For every node in the project, expose the executables of its linked children (and of
/// its bundled dependencies) in `<node.peripheral>/node_modules/.bin`.
///
/// Must run after importing and module linking finished: children are read
/// through the links in the node's `modules` directory.
///
/// # Errors
/// Returns the first failure to read a manifest or create an entry.
pub async fn link_all_bins(
    graph: &DepGraph,
    include_optional: bool,
    limiter: &LinkLimiter,
) -> Result<()> {
    // Independent nodes are store entries and have no children; nothing is
    // written below the store.
    let jobs = graph.nodes().filter(|node| !node.independent).map(|node| {
        let bin_dir = node.peripheral_location.join("node_modules").join(".bin");
        let children: Vec<PathBuf> = node
            .children_to_link(include_optional)
            .map(|(alias, _)| join_slashed(&node.modules, alias))
            .collect();
        let bundled = node
            .has_bundled_dependencies
            .then(|| node.peripheral_location.join("node_modules"));

        limiter.run(super::blocking(move || {
            for child in &children {
                link_pkg_bins(child, &bin_dir)?;
            }
            if let Some(bundled) = &bundled {
                link_bins(bundled, &bin_dir)?;
            }
            Ok(())
        }))
    });
    try_join_all(jobs).await?;
    Ok(())
}
