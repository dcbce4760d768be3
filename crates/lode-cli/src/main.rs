#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::Parser;
use commands::install::InstallArgs;
use lode_core::Config;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lode")]
#[command(author, version, about = "Install node_modules from a lockfile", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Materialize node_modules from lode-lock.json without resolving
    #[command(alias = "i")]
    Install {
        /// Only production dependencies
        #[arg(long, alias = "production")]
        prod: bool,

        /// Only development dependencies
        #[arg(long)]
        dev: bool,

        /// Skip optional dependencies
        #[arg(long)]
        no_optional: bool,

        /// Use packages without dependencies straight from the store
        #[arg(long)]
        independent_leaves: bool,

        /// Refetch and reimport every package
        #[arg(long)]
        force: bool,

        /// Re-hash stored packages before reusing them
        #[arg(long)]
        verify_store_integrity: bool,

        /// Import by copy and reuse build side effects cached for this engine
        #[arg(long)]
        side_effects_cache: bool,

        /// Content-addressable store location
        #[arg(long, env = "LODE_STORE_DIR", value_name = "PATH")]
        store_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.json);

    let cwd = match cli.cwd {
        Some(dir) if dir.is_absolute() => dir,
        Some(dir) => std::env::current_dir().into_diagnostic()?.join(dir),
        None => std::env::current_dir().into_diagnostic()?,
    };
    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    match cli.command {
        None | Some(Commands::Version) => commands::version::run(cli.json),
        Some(Commands::Install {
            prod,
            dev,
            no_optional,
            independent_leaves,
            force,
            verify_store_integrity,
            side_effects_cache,
            store_dir,
        }) => {
            let args = InstallArgs {
                production: prod,
                development: dev,
                no_optional,
                independent_leaves,
                force,
                verify_store_integrity,
                side_effects_cache,
                store_dir,
            };
            commands::install::run(&config, &args)
        }
    }
}
