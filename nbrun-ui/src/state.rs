//! Shared application state for the dashboard server.

use std::path::PathBuf;
use std::sync::Arc;

use nbrun::core::types::RunReport;
use nbrun::io::config::{STATE_DIR, config_path};
use tokio::sync::{Mutex, RwLock, broadcast};

/// Events broadcast to SSE clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    RunStarted,
    RunFinished { failed: bool, new_artifacts: usize },
    /// Files directly in the working directory were created or modified.
    FilesChanged { names: Vec<String> },
    ConfigChanged,
}

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Working directory the script runs in.
    pub workdir: PathBuf,
    /// Broadcast sender for change events.
    pub event_tx: Arc<broadcast::Sender<ChangeEvent>>,
    /// Held for the duration of a run; runs never overlap.
    pub run_lock: Arc<Mutex<()>>,
    /// Report of the most recent run served by this process.
    pub last_report: Arc<RwLock<Option<RunReport>>>,
}

impl AppState {
    pub fn new(workdir: PathBuf) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            workdir,
            event_tx: Arc::new(event_tx),
            run_lock: Arc::new(Mutex::new(())),
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    /// Path to .nbrun/ directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workdir.join(STATE_DIR)
    }

    /// Path to config.toml.
    pub fn config_path(&self) -> PathBuf {
        config_path(&self.workdir)
    }

    /// Broadcast an event; having no subscribers is fine.
    pub fn notify(&self, event: ChangeEvent) {
        let _ = self.event_tx.send(event);
    }
}
