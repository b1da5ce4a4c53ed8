//! Stable exit codes for nbrun CLI commands.

/// Command succeeded; for `nbrun run`, the script completed without error.
pub const OK: i32 = 0;
/// Invalid config or input, or a pre-run error (missing script, dataset or directory).
pub const INVALID: i32 = 1;
/// `nbrun run` executed the script and it failed.
pub const SCRIPT_FAILED: i32 = 2;
