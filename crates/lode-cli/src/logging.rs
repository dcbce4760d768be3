//! Logging initialization for the CLI.
//!
//! Library crates only emit `tracing` events; the subscriber lives here.

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `verbosity`: 0 = INFO, 1 = DEBUG, 2+ = TRACE for lode's own targets.
/// With `json`, every event is one JSON line on stderr:
///
/// ```json
/// {"timestamp":"...","level":"INFO","fields":{"message":"installed","packages":3},"target":"lode_core::headless"}
/// ```
///
/// A second call leaves the first subscriber in place and prints a warning.
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG sets the base, verbosity raises lode's crates
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    for target in ["lode_core", "lode_cli"] {
        if let Ok(directive) = format!("{target}={level}").parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("warning: logging not initialized: {e}");
    }
}
