//! Sandbox configuration stored under `.nbrun/config.toml` in the working directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::figure::FigureSettings;

/// Directory (relative to the working directory) holding sandbox state.
pub const STATE_DIR: &str = ".nbrun";

/// Sandbox configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values a
/// notebook-export workflow expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NbrunConfig {
    /// Script to run, relative to the working directory.
    pub script_path: String,

    /// Fixed file name the script reads its dataset from.
    pub dataset_name: String,

    /// Refuse to start a run when the dataset is neither uploaded nor present.
    pub require_dataset: bool,

    pub figure: FigureSettings,
}

impl Default for NbrunConfig {
    fn default() -> Self {
        Self {
            script_path: "notebook_code.rhai".to_string(),
            dataset_name: "dataset.csv".to_string(),
            require_dataset: true,
            figure: FigureSettings::default(),
        }
    }
}

impl NbrunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.script_path.trim().is_empty() {
            return Err(anyhow!("script_path must be non-empty"));
        }
        if self.dataset_name.trim().is_empty() {
            return Err(anyhow!("dataset_name must be non-empty"));
        }
        if self.dataset_name.contains(['/', '\\']) {
            return Err(anyhow!("dataset_name must be a bare file name"));
        }
        if self.figure.width == 0 || self.figure.height == 0 {
            return Err(anyhow!("figure.width and figure.height must be > 0"));
        }
        if self.figure.hist_bins == 0 {
            return Err(anyhow!("figure.hist_bins must be > 0"));
        }
        Ok(())
    }

    /// Absolute script path for `workdir`.
    pub fn script_in(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.script_path)
    }
}

/// `<workdir>/.nbrun/config.toml`.
pub fn config_path(workdir: &Path) -> PathBuf {
    workdir.join(STATE_DIR).join("config.toml")
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `NbrunConfig::default()`.
pub fn load_config(path: &Path) -> Result<NbrunConfig> {
    if !path.exists() {
        let cfg = NbrunConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: NbrunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &NbrunConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
