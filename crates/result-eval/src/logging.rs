//! Tracing configuration for the CLI.
//!
//! Logs go to stderr so that `--format json` output on stdout stays
//! machine readable.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing.
///
/// `RUST_LOG` takes precedence. Otherwise only warnings are shown, or debug
/// events from this tool when `verbose` is set.
pub fn init(verbose: bool, color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("result_eval=debug,result_eval_core=debug,warn")
        } else {
            EnvFilter::new("warn")
        }
    });

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(color)
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}
