//! Notebook-script sandbox CLI.
//!
//! Runs the configured analysis script (`.nbrun/config.toml`, default
//! `notebook_code.rhai`) against a dataset in a working directory and prints
//! what it produced: captured output, diagnostics, new images and the
//! directory listing.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nbrun::core::types::{FileEntry, RunReport, Widget};
use nbrun::exit_codes;
use nbrun::io::config::{NbrunConfig, STATE_DIR, config_path, write_config};
use nbrun::io::workspace::list_files;
use nbrun::session::{DatasetSource, SessionOptions, run_session};

/// Rows shown per table widget in terminal output.
const TABLE_PREVIEW_ROWS: usize = 20;

#[derive(Parser)]
#[command(
    name = "nbrun",
    version,
    about = "Run an unmodified notebook script in a sandbox and report its outputs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.nbrun/config.toml` with defaults if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
        /// Working directory.
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
    },
    /// Run the script and print its outputs.
    Run {
        /// Script to run instead of the configured one.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Working directory the script runs in.
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
        /// Local file to install as the dataset before running.
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Discard `plt::show` / `display` output.
        #[arg(long)]
        headless: bool,
        /// Write each shown figure as `figure-<n>.svg` into this directory.
        #[arg(long)]
        figures_dir: Option<PathBuf>,
        /// Print the whole report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the files in the working directory.
    Ls {
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
    },
}

fn main() {
    nbrun::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force, workdir } => cmd_init(&workdir, force),
        Command::Run {
            script,
            workdir,
            dataset,
            headless,
            figures_dir,
            json,
        } => {
            let opts = SessionOptions {
                script,
                dataset: dataset.map_or(DatasetSource::Existing, DatasetSource::File),
                headless,
            };
            cmd_run(&workdir, &opts, figures_dir.as_deref(), json)
        }
        Command::Ls { workdir } => cmd_ls(&workdir),
    }
}

fn cmd_init(workdir: &Path, force: bool) -> Result<i32> {
    let path = config_path(workdir);
    if path.exists() && !force {
        println!("{} exists (use --force to overwrite)", path.display());
        return Ok(exit_codes::OK);
    }
    fs::create_dir_all(workdir.join(STATE_DIR))
        .with_context(|| format!("create {STATE_DIR} directory"))?;
    write_config(&path, &NbrunConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(
    workdir: &Path,
    opts: &SessionOptions,
    figures_dir: Option<&Path>,
    json: bool,
) -> Result<i32> {
    let report = run_session(workdir, opts)?;
    if let Some(dir) = figures_dir {
        write_figures(dir, &report.widgets)?;
    }
    if json {
        let payload = serde_json::to_string_pretty(&report).context("serialize report")?;
        println!("{payload}");
    } else {
        print!("{}", render_report(&report));
    }
    Ok(if report.result.failed {
        exit_codes::SCRIPT_FAILED
    } else {
        exit_codes::OK
    })
}

fn cmd_ls(workdir: &Path) -> Result<i32> {
    print!("{}", render_listing(&list_files(workdir)?));
    Ok(exit_codes::OK)
}

/// Write every figure widget as `figure-<n>.svg`, numbered in show order.
fn write_figures(dir: &Path, widgets: &[Widget]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let svgs = widgets.iter().filter_map(|w| match w {
        Widget::Figure { svg, .. } => Some(svg),
        _ => None,
    });
    for (idx, svg) in svgs.enumerate() {
        let path = dir.join(format!("figure-{}.svg", idx + 1));
        fs::write(&path, svg).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

fn render_report(report: &RunReport) -> String {
    let result = &report.result;
    let mut out = String::new();

    out.push_str("== output ==\n");
    out.push_str(&result.captured_output);
    out.push_str("== diagnostics ==\n");
    out.push_str(&result.captured_diagnostics);
    if let Some(message) = &result.failure_message {
        out.push_str(&format!("error: {message}\n"));
    }

    out.push_str("== widgets ==\n");
    for widget in &report.widgets {
        match widget {
            Widget::Figure { id, title, .. } => {
                let title = title.as_deref().unwrap_or("untitled");
                out.push_str(&format!("[figure {id}: {title}]\n"));
            }
            Widget::Table(table) => out.push_str(&table.render_text(TABLE_PREVIEW_ROWS)),
            Widget::Text { text } => {
                out.push_str(text);
                out.push('\n');
            }
        }
    }

    out.push_str("== new images ==\n");
    for name in &result.new_artifacts {
        out.push_str(name);
        out.push('\n');
    }

    out.push_str("== files ==\n");
    out.push_str(&render_listing(&report.files));
    out
}

fn render_listing(files: &[FileEntry]) -> String {
    let width = files.iter().map(|f| f.size.to_string().len()).max().unwrap_or(0);
    files
        .iter()
        .map(|f| format!("{:>width$}  {}\n", f.size, f.name))
        .collect()
}
