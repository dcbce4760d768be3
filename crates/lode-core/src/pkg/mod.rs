//! Package-level building blocks of an install.
//!
//! - Reading the lockfile and filtering it per install mode
//! - Dependency path transforms (relative, absolute, parsed)
//! - Fetch descriptors derived from locked resolutions
//! - Directory links inside `node_modules`
//! - Executable discovery (`package.json` `bin`) and `.bin` entries

pub mod bins;
pub mod dep_path;
pub mod filter;
pub mod link;
pub mod lockfile;
pub mod manifest;
pub mod resolution;

pub use bins::{link_bins, link_pkg_bins, BinError};
pub use dep_path::{DepPathError, ParsedDepPath};
pub use filter::{filter_lockfile, FilterOptions};
pub use link::symlink_dir;
pub use lockfile::{
    codes as lockfile_codes, read_wanted, BundledDependencies, LockResolution, Lockfile,
    LockfileError, PackageSnapshot, DEFAULT_REGISTRY, LOCKFILE_NAME, PKG_LOCK_SCHEMA_VERSION,
};
pub use manifest::{BinCommand, ManifestError, PackageManifest};
pub use resolution::Resolution;
