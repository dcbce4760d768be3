use lode_core::{headless_install, paths, Config, InstallOptions, LocalStore};
use miette::{miette, IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::debug;

/// Flags of `lode install`.
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    pub production: bool,
    pub development: bool,
    pub no_optional: bool,
    pub independent_leaves: bool,
    pub force: bool,
    pub verify_store_integrity: bool,
    pub side_effects_cache: bool,
    pub store_dir: Option<PathBuf>,
}

impl InstallArgs {
    fn options(&self, prefix: PathBuf) -> InstallOptions {
        let mut opts = InstallOptions::new(prefix)
            .with_optional(!self.no_optional)
            .with_independent_leaves(self.independent_leaves)
            .with_force(self.force)
            .with_verify_store_integrity(self.verify_store_integrity)
            .with_side_effects_cache(self.side_effects_cache);
        // --prod and --dev together mean both
        if self.production && !self.development {
            opts = opts.production_only();
        } else if self.development && !self.production {
            opts = opts.development_only();
        }
        if let Some(dir) = &self.store_dir {
            opts = opts.with_store_path(dir.clone());
        }
        opts
    }
}

pub fn run(config: &Config, args: &InstallArgs) -> Result<()> {
    let prefix = paths::project_root(&config.cwd).unwrap_or_else(|| config.cwd.clone());
    let opts = args.options(prefix);
    debug!(
        prefix = %opts.prefix.display(),
        store = %opts.store_path.display(),
        engine = %opts.engine,
        "install"
    );

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let outcome = runtime.block_on(async {
        let store = LocalStore::new(opts.store_path.clone())
            .map_err(|e| miette!("HEADLESS_STORE_FAILED: {e}"))?;
        headless_install(&opts, &store)
            .await
            .map_err(|e| miette!("{}: {e}", e.code()))
    });

    match (&outcome, config.json_logs) {
        (Ok(summary), true) => {
            let value = serde_json::json!({ "ok": true, "summary": summary });
            println!("{value}");
        }
        (Err(err), true) => {
            let value = serde_json::json!({ "ok": false, "error": err.to_string() });
            println!("{value}");
        }
        _ => {}
    }
    outcome.map(|_| ())
}
