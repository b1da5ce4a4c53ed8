//! Notebook-script execution sandbox.
//!
//! Runs an unmodified analysis script in an isolated namespace, captures what
//! it prints, turns its plotting and `display` calls into host widgets, and
//! reports the image files it created. The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure logic (figure model, SVG rendering, tables, inventory
//!   diff). No I/O.
//! - **[`io`]**: Side-effecting operations (config, datasets, directory
//!   inventory, rasterizing figures).
//! - **[`sandbox`]**: The script engine wiring; [`sandbox::run`] is the entry
//!   point.
//!
//! [`session`] coordinates config, dataset placement and a run for the host
//! surfaces (CLI and web UI).

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod render;
pub mod sandbox;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
