//! Deterministic, pure logic shared by the sandbox.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod artifacts;
pub mod figure;
pub mod svg;
pub mod table;
pub mod types;
