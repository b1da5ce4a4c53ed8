//! Development-time tracing for debugging the sandbox.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`, output to stderr.
//!   Not part of run output.
//!
//! - **Captured output (`sandbox::capture`)**: What the script itself printed.
//!   Always captured per run, unaffected by `RUST_LOG`. Script output printed
//!   outside a run is forwarded here under the `nbrun::script` target.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing for the CLI: `RUST_LOG`, or `warn` when unset.
///
/// ```bash
/// RUST_LOG=nbrun=debug nbrun run --headless
/// ```
pub fn init() {
    init_with_default("warn");
}

/// Initialize tracing with `default` as the filter when `RUST_LOG` is unset
/// or unparsable. Output goes to stderr in compact form.
pub fn init_with_default(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
