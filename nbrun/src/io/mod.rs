//! I/O helpers for the sandbox and its host surfaces.

pub mod config;
pub mod dataset;
pub mod inventory;
pub mod raster;
pub mod workspace;
