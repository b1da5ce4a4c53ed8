//! Result types shared by the sandbox and host surfaces.
//!
//! These are plain data: serializable, `Send`, and free of engine state so they
//! can cross from the blocking run thread to an async server.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::figure::FigureId;
use crate::core::table::Table;

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// Everything the script printed, in write order.
    pub captured_output: String,
    /// Everything written to the diagnostic channel, in write order.
    pub captured_diagnostics: String,
    /// Image files created by the run, sorted by name.
    pub new_artifacts: Vec<String>,
    pub failed: bool,
    /// `"<ErrorClass>: <message>"` when `failed`.
    pub failure_message: Option<String>,
    /// Top-level script variables left in the namespace (name -> debug text).
    pub variables: BTreeMap<String, String>,
}

/// Something a renderer produced for the host surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Widget {
    Figure {
        id: FigureId,
        title: Option<String>,
        svg: String,
    },
    Table(Table),
    Text {
        text: String,
    },
}

/// One regular file in the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// Everything a host surface shows after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub result: RunResult,
    pub widgets: Vec<Widget>,
    pub files: Vec<FileEntry>,
}
