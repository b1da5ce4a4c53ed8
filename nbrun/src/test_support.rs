//! Test-only helpers: temporary working directories and recording renderers.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::figure::{Figure, FigureId};
use crate::core::table::Table;
use crate::render::Renderer;

/// A throwaway working directory, removed on drop.
#[derive(Debug)]
pub struct TestWorkdir {
    temp: TempDir,
}

impl TestWorkdir {
    pub fn new() -> Self {
        Self {
            temp: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    /// Write `contents` to `name`, creating parent directories.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write fixture");
        path
    }
}

impl Default for TestWorkdir {
    fn default() -> Self {
        Self::new()
    }
}

/// Records every render call. Figures listed in `fail_figure_ids` (and all
/// tables when `fail_tables` is set) fail instead of being recorded.
#[derive(Debug, Default)]
pub struct CountingRenderer {
    pub figures: Vec<Figure>,
    pub tables: usize,
    pub objects: Vec<String>,
    pub fail_figure_ids: Vec<FigureId>,
    pub fail_tables: bool,
}

impl Renderer for CountingRenderer {
    fn figure(&mut self, figure: &Figure) -> Result<()> {
        if self.fail_figure_ids.contains(&figure.id) {
            return Err(anyhow!("figure {} refused", figure.id));
        }
        self.figures.push(figure.clone());
        Ok(())
    }

    fn table(&mut self, _table: &Table) -> Result<()> {
        if self.fail_tables {
            return Err(anyhow!("tables refused"));
        }
        self.tables += 1;
        Ok(())
    }

    fn object(&mut self, text: &str) -> Result<()> {
        self.objects.push(text.to_string());
        Ok(())
    }
}
