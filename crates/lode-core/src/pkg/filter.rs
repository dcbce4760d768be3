//! Install-mode filtering of a lockfile.
//!
//! Runs before graph construction so that excluded packages are never
//! fetched, imported or linked.

use super::lockfile::{Lockfile, PackageSnapshot};
use std::collections::BTreeMap;

/// Which dependency classes to drop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub no_dev: bool,
    pub no_optional: bool,
    pub no_prod: bool,
}

impl FilterOptions {
    /// Derive the filter from the "include" flags of an install.
    #[must_use]
    pub fn from_includes(development: bool, optional: bool, production: bool) -> Self {
        Self {
            no_dev: !development,
            no_optional: !optional,
            no_prod: !production,
        }
    }

    /// Whether `snapshot` survives this filter.
    ///
    /// A snapshot with `dev` unset is needed by both sets, so `no_prod` only
    /// drops packages explicitly marked `dev: false` that are not optional.
    #[must_use]
    pub fn keeps(&self, snapshot: &PackageSnapshot) -> bool {
        if self.no_prod && snapshot.dev == Some(false) && !snapshot.is_optional() {
            return false;
        }
        if self.no_dev && snapshot.dev == Some(true) {
            return false;
        }
        if self.no_optional && snapshot.is_optional() {
            return false;
        }
        true
    }
}

/// Return a copy of `lockfile` with excluded packages removed.
///
/// Root dependency maps of an excluded class are emptied too. Registry,
/// version and specifiers are carried over unchanged.
#[must_use]
pub fn filter_lockfile(lockfile: &Lockfile, opts: FilterOptions) -> Lockfile {
    let packages = lockfile
        .packages
        .iter()
        .filter(|(_, snapshot)| opts.keeps(snapshot))
        .map(|(dep_path, snapshot)| (dep_path.clone(), snapshot.clone()))
        .collect();

    let keep_unless = |excluded: bool, deps: &BTreeMap<String, String>| {
        if excluded {
            BTreeMap::new()
        } else {
            deps.clone()
        }
    };

    Lockfile {
        lockfile_version: lockfile.lockfile_version,
        registry: lockfile.registry.clone(),
        dependencies: keep_unless(opts.no_prod, &lockfile.dependencies),
        dev_dependencies: keep_unless(opts.no_dev, &lockfile.dev_dependencies),
        optional_dependencies: keep_unless(opts.no_optional, &lockfile.optional_dependencies),
        specifiers: lockfile.specifiers.clone(),
        packages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(dev: Option<bool>, optional: Option<bool>) -> PackageSnapshot {
        PackageSnapshot {
            dev,
            optional,
            ..PackageSnapshot::default()
        }
    }

    fn sample() -> Lockfile {
        let mut lockfile = Lockfile::default();
        lockfile.add_package("/prod/1.0.0", snapshot(Some(false), None));
        lockfile.add_package("/dev/1.0.0", snapshot(Some(true), None));
        lockfile.add_package("/both/1.0.0", snapshot(None, None));
        lockfile.add_package("/opt/1.0.0", snapshot(Some(false), Some(true)));
        lockfile.add_package("/devopt/1.0.0", snapshot(Some(true), Some(true)));
        lockfile.dependencies.insert("prod".into(), "1.0.0".into());
        lockfile.dev_dependencies.insert("dev".into(), "1.0.0".into());
        lockfile.optional_dependencies.insert("opt".into(), "1.0.0".into());
        lockfile.specifiers.insert("prod".into(), "^1.0.0".into());
        lockfile
    }

    fn keys(lockfile: &Lockfile) -> Vec<&str> {
        lockfile.packages.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_include_everything_keeps_everything() {
        let lockfile = sample();
        let filtered = filter_lockfile(&lockfile, FilterOptions::default());
        assert_eq!(filtered, lockfile);
    }

    #[test]
    fn test_no_dev() {
        let filtered = filter_lockfile(
            &sample(),
            FilterOptions {
                no_dev: true,
                ..FilterOptions::default()
            },
        );
        assert_eq!(keys(&filtered), vec!["/both/1.0.0", "/opt/1.0.0", "/prod/1.0.0"]);
        assert!(filtered.dev_dependencies.is_empty());
        assert_eq!(filtered.dependencies.len(), 1);
    }

    #[test]
    fn test_no_prod_keeps_optional_and_shared() {
        let filtered = filter_lockfile(
            &sample(),
            FilterOptions {
                no_prod: true,
                ..FilterOptions::default()
            },
        );
        assert_eq!(
            keys(&filtered),
            vec!["/both/1.0.0", "/dev/1.0.0", "/devopt/1.0.0", "/opt/1.0.0"]
        );
        assert!(filtered.dependencies.is_empty());
        assert_eq!(filtered.specifiers.len(), 1);
    }

    #[test]
    fn test_no_optional() {
        let filtered = filter_lockfile(
            &sample(),
            FilterOptions {
                no_optional: true,
                ..FilterOptions::default()
            },
        );
        assert_eq!(keys(&filtered), vec!["/both/1.0.0", "/dev/1.0.0", "/prod/1.0.0"]);
        assert!(filtered.optional_dependencies.is_empty());
    }

    #[test]
    fn test_production_install_flags() {
        let opts = FilterOptions::from_includes(false, false, true);
        let filtered = filter_lockfile(&sample(), opts);
        assert_eq!(keys(&filtered), vec!["/both/1.0.0", "/prod/1.0.0"]);
    }

    #[test]
    fn test_filter_matches_predicate_and_is_idempotent() {
        let lockfile = sample();
        for bits in 0u8..8 {
            let opts = FilterOptions {
                no_dev: bits & 1 != 0,
                no_optional: bits & 2 != 0,
                no_prod: bits & 4 != 0,
            };
            let once = filter_lockfile(&lockfile, opts);
            for (dep_path, snapshot) in &lockfile.packages {
                let expected = !(opts.no_prod
                    && snapshot.dev == Some(false)
                    && snapshot.optional != Some(true))
                    && !(opts.no_dev && snapshot.dev == Some(true))
                    && !(opts.no_optional && snapshot.optional == Some(true));
                assert_eq!(once.packages.contains_key(dep_path), expected, "{dep_path} {opts:?}");
            }
            assert_eq!(filter_lockfile(&once, opts), once);
        }
    }

    #[test]
    fn test_absent_packages_is_empty() {
        let lockfile = Lockfile::from_json("{}").unwrap();
        let filtered = filter_lockfile(&lockfile, FilterOptions::from_includes(false, false, false));
        assert!(filtered.packages.is_empty());
    }
}
