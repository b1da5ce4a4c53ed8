//! One host-surface run: config, dataset placement, script, sandbox, listing.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::core::types::{FileEntry, RunReport};
use crate::io::config::{NbrunConfig, config_path, load_config};
use crate::io::workspace::{ensure_dataset, list_files, place_dataset, read_script};
use crate::render::{HeadlessRenderer, HostRenderer, SharedRenderer};
use crate::sandbox::{self, RunRequest};

/// Namespace binding holding the dataset file name.
pub const DATASET_BINDING: &str = "DATASET";

/// Where the run's dataset comes from.
#[derive(Debug, Clone, Default)]
pub enum DatasetSource {
    /// Uploaded bytes, saved under the configured dataset name.
    Upload(Vec<u8>),
    /// A local file copied in under the configured dataset name.
    File(PathBuf),
    /// Whatever is already in the working directory.
    #[default]
    Existing,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Script to run instead of the configured `script_path`.
    pub script: Option<PathBuf>,
    pub dataset: DatasetSource,
    /// Drop `show`/`display` output instead of collecting widgets.
    pub headless: bool,
}

/// Run the configured script in `workdir`.
///
/// Every `Err` is a pre-run error: bad config, missing directory, script or
/// dataset. A script that fails still yields `Ok` with `result.failed` set,
/// and so does a run whose final directory listing cannot be read.
pub fn run_session(workdir: &Path, opts: &SessionOptions) -> Result<RunReport> {
    if !workdir.is_dir() {
        return Err(anyhow!("working directory not found: {}", workdir.display()));
    }
    let cfg = load_config(&config_path(workdir))?;
    prepare_dataset(workdir, &cfg, &opts.dataset)?;

    let script_path = match &opts.script {
        Some(path) if path.is_relative() => workdir.join(path),
        Some(path) => path.clone(),
        None => cfg.script_in(workdir),
    };
    let script = read_script(&script_path)?;
    let source_label = script_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&cfg.script_path)
        .to_string();

    let mut request = RunRequest::new(script, source_label, workdir.to_path_buf())
        .with_binding(DATASET_BINDING, cfg.dataset_name.clone());
    request.figure = cfg.figure.clone();

    let (result, widgets) = if opts.headless {
        let renderer: SharedRenderer = Rc::new(RefCell::new(HeadlessRenderer));
        (sandbox::run(&request, renderer)?, Vec::new())
    } else {
        let host = Rc::new(RefCell::new(HostRenderer::new(cfg.figure.size())));
        let result = sandbox::run(&request, host.clone())?;
        let widgets = host.borrow_mut().take_widgets();
        (result, widgets)
    };

    let files = listing_after_run(workdir);
    info!(
        script = %script_path.display(),
        failed = result.failed,
        widgets = widgets.len(),
        "session finished"
    );
    Ok(RunReport {
        result,
        widgets,
        files,
    })
}

/// Directory listing for the report. The run has already happened, so a
/// listing failure is logged and reported as an empty listing.
fn listing_after_run(workdir: &Path) -> Vec<FileEntry> {
    list_files(workdir).unwrap_or_else(|err| {
        warn!(error = %format!("{err:#}"), "listing working directory failed after run");
        Vec::new()
    })
}

fn prepare_dataset(workdir: &Path, cfg: &NbrunConfig, source: &DatasetSource) -> Result<()> {
    match source {
        DatasetSource::Upload(bytes) => {
            place_dataset(workdir, &cfg.dataset_name, bytes)?;
        }
        DatasetSource::File(path) => {
            let target = workdir.join(&cfg.dataset_name);
            let same = fs::canonicalize(path).ok() == fs::canonicalize(&target).ok()
                && target.exists();
            if !same {
                let bytes = fs::read(path)
                    .with_context(|| format!("read dataset {}", path.display()))?;
                place_dataset(workdir, &cfg.dataset_name, &bytes)?;
            }
        }
        DatasetSource::Existing => {
            if cfg.require_dataset {
                ensure_dataset(workdir, &cfg.dataset_name)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Widget;
    use crate::io::config::write_config;
    use crate::test_support::TestWorkdir;

    const SCRIPT: &str = r#"
        let rows = read_csv(DATASET);
        print(`rows: ${rows.len()}`);
        display(rows);
        plt::bar(["a", "b"], [1, 2]);
        plt::savefig("bars.png");
        plt::show();
    "#;

    #[test]
    fn upload_run_reports_all_four_outputs() {
        let workdir = TestWorkdir::new();
        workdir.write("notebook_code.rhai", SCRIPT);
        let opts = SessionOptions {
            dataset: DatasetSource::Upload(b"AGE\n63\n71\n".to_vec()),
            ..SessionOptions::default()
        };

        let report = run_session(workdir.path(), &opts).expect("session");
        assert!(!report.result.failed, "{:?}", report.result.failure_message);
        assert_eq!(report.result.captured_output, "rows: 2\n");
        assert_eq!(report.result.new_artifacts, vec!["bars.png".to_string()]);
        assert_eq!(report.widgets.len(), 2);
        assert!(matches!(report.widgets[0], Widget::Table(_)));
        assert!(matches!(report.widgets[1], Widget::Figure { .. }));
        let names: Vec<&str> = report.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["bars.png", "dataset.csv", "notebook_code.rhai"]);
    }

    #[test]
    fn missing_dataset_is_a_pre_run_error() {
        let workdir = TestWorkdir::new();
        workdir.write("notebook_code.rhai", SCRIPT);
        let err = run_session(workdir.path(), &SessionOptions::default()).unwrap_err();
        assert!(err.to_string().contains("dataset.csv"));
    }

    #[test]
    fn dataset_optional_when_config_allows() {
        let workdir = TestWorkdir::new();
        workdir.write("notebook_code.rhai", r#"print("no data");"#);
        let cfg = NbrunConfig {
            require_dataset: false,
            ..NbrunConfig::default()
        };
        write_config(&config_path(workdir.path()), &cfg).expect("config");

        let report = run_session(workdir.path(), &SessionOptions::default()).expect("session");
        assert_eq!(report.result.captured_output, "no data\n");
    }

    #[test]
    fn missing_script_is_a_pre_run_error() {
        let workdir = TestWorkdir::new();
        workdir.write("dataset.csv", "AGE\n1\n");
        let err = run_session(workdir.path(), &SessionOptions::default()).unwrap_err();
        assert!(err.to_string().contains("script not found"));
    }

    #[test]
    fn headless_runs_collect_no_widgets() {
        let workdir = TestWorkdir::new();
        workdir.write("dataset.csv", "AGE\n1\n");
        workdir.write("other.rhai", SCRIPT);
        let opts = SessionOptions {
            script: Some(PathBuf::from("other.rhai")),
            headless: true,
            ..SessionOptions::default()
        };

        let report = run_session(workdir.path(), &opts).expect("session");
        assert!(!report.result.failed);
        assert!(report.widgets.is_empty());
        assert_eq!(report.result.new_artifacts, vec!["bars.png".to_string()]);
    }

    #[test]
    fn unreadable_listing_after_run_is_empty() {
        let workdir = TestWorkdir::new();
        workdir.write("kept.png", b"png");
        assert_eq!(listing_after_run(workdir.path()).len(), 1);
        assert!(listing_after_run(&workdir.join("vanished")).is_empty());
    }

    #[test]
    fn local_dataset_file_is_copied_in() {
        let workdir = TestWorkdir::new();
        let source = TestWorkdir::new();
        let local = source.write("admissions.csv", "AGE\n5\n");
        workdir.write("notebook_code.rhai", r#"print(read_text(DATASET));"#);
        let opts = SessionOptions {
            dataset: DatasetSource::File(local),
            ..SessionOptions::default()
        };

        let report = run_session(workdir.path(), &opts).expect("session");
        assert_eq!(report.result.captured_output, "AGE\n5\n\n");
    }
}
