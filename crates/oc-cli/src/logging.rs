//! Tracing subscriber setup.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const CRATES: [&str; 3] = ["oc_client", "oc_core", "oc_cli"];

fn crate_filter(level: &str) -> EnvFilter {
    let directives: Vec<String> = CRATES.iter().map(|c| format!("{}={}", c, level)).collect();
    EnvFilter::new(format!("warn,{}", directives.join(",")))
}

/// Console logging for the shell and one-shot commands.
pub(crate) fn init(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Benchmark logging: plain progress lines on the console and a detailed,
/// timestamped log file.
pub(crate) fn init_bench(verbose: bool, quiet: bool, log_file: Option<&Path>) -> miette::Result<()> {
    let console_level = match (verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    };
    let console = fmt::layer()
        .without_time()
        .with_target(false)
        .with_level(false)
        .with_filter(crate_filter(console_level));

    let file = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                miette::miette!("Failed to create log file {}: {}", path.display(), e)
            })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(crate_filter("debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .ok();
    Ok(())
}
