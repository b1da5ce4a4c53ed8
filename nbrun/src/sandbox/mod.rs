//! Script execution sandbox.
//!
//! [`run`] executes one script in a fresh namespace with output capture,
//! the `plt`/`display` interceptors and the filesystem bindings installed, then
//! diffs the working directory's image inventory.

pub mod bindings;
pub mod capture;
pub mod display;
pub mod namespace;
pub mod plot;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use rhai::{Engine, EvalAltResult, Scope};
use tracing::{debug, info, instrument, warn};

use crate::core::artifacts::new_artifacts;
use crate::core::figure::FigureSettings;
use crate::core::types::RunResult;
use crate::io::inventory::snapshot;
use crate::render::SharedRenderer;
use capture::{CaptureScope, CapturedOutput};
use namespace::Namespace;
use plot::PlotContext;

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub script: String,
    /// Name errors are attributed to, usually the script's file name.
    pub source_label: String,
    pub workdir: PathBuf,
    /// Extra string constants seeded into the namespace (e.g. `DATASET`).
    pub bindings: BTreeMap<String, String>,
    pub figure: FigureSettings,
}

impl RunRequest {
    pub fn new(script: impl Into<String>, source_label: impl Into<String>, workdir: PathBuf) -> Self {
        Self {
            script: script.into(),
            source_label: source_label.into(),
            workdir,
            bindings: BTreeMap::new(),
            figure: FigureSettings::default(),
        }
    }

    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }
}

/// Run a script and report its outputs.
///
/// Returns `Err` only when the working directory cannot be inventoried before
/// the run. Script failures (compile or run time) are reported in the
/// [`RunResult`], together with whatever output and artifacts they produced.
#[instrument(skip_all, fields(source = %request.source_label, workdir = %request.workdir.display()))]
pub fn run(request: &RunRequest, renderer: SharedRenderer) -> Result<RunResult> {
    let before = snapshot(&request.workdir).with_context(|| {
        format!(
            "inventory working directory {} before run",
            request.workdir.display()
        )
    })?;

    let output = CapturedOutput::default();
    let mut engine = Engine::new();
    let plot = Rc::new(PlotContext::new(
        renderer.clone(),
        output.stderr.clone(),
        request.workdir.clone(),
        request.figure.clone(),
    ));
    plot::register(&mut engine, plot.clone());
    display::register(&mut engine, renderer);
    bindings::register(&mut engine, request.workdir.clone(), output.stderr.clone());

    let mut namespace = Namespace::new(&request.workdir, &request.bindings);
    let outcome = {
        let capture = CaptureScope::begin(&mut engine, &output);
        execute(
            &capture,
            &request.script,
            &request.source_label,
            namespace.scope_mut(),
        )
    };

    let unshown = plot.registry().open_count();
    if unshown > 0 {
        debug!(figures = unshown, "figures left open at end of run");
    }

    let after = match snapshot(&request.workdir) {
        Ok(after) => after,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "inventory after run failed; reporting no artifacts");
            before.clone()
        }
    };

    let failure_message = outcome.err();
    let result = RunResult {
        captured_output: output.stdout.contents(),
        captured_diagnostics: output.stderr.contents(),
        new_artifacts: new_artifacts(&before, &after),
        failed: failure_message.is_some(),
        failure_message,
        variables: namespace.variables(),
    };
    info!(
        failed = result.failed,
        artifacts = result.new_artifacts.len(),
        "run finished"
    );
    Ok(result)
}

/// Compile and run; `Err` carries the single failure message.
fn execute(
    engine: &Engine,
    script: &str,
    source_label: &str,
    scope: &mut Scope<'static>,
) -> std::result::Result<(), String> {
    let mut ast = engine
        .compile(script)
        .map_err(|err| format!("SyntaxError: {err} in {source_label}"))?;
    ast.set_source(source_label);

    match engine.run_ast_with_scope(scope, &ast) {
        Ok(()) => Ok(()),
        Err(err) if matches!(*err, EvalAltResult::Exit(..)) => {
            debug!("script called exit()");
            Ok(())
        }
        Err(err) => Err(failure_message(&err, source_label)),
    }
}

/// `"<ErrorClass>: <message>"` for the innermost cause of `err`.
pub fn failure_message(err: &EvalAltResult, source_label: &str) -> String {
    let root = innermost(err);
    let detail = match root {
        EvalAltResult::ErrorRuntime(value, pos) if !pos.is_none() => format!("{value} ({pos})"),
        EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
        other => other.to_string(),
    };
    format!("{}: {detail} in {source_label}", error_class(root))
}

fn innermost(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
        | EvalAltResult::ErrorInModule(_, inner, _) => innermost(inner),
        other => other,
    }
}

/// Class name reported for a run-time error.
pub fn error_class(err: &EvalAltResult) -> &'static str {
    match innermost(err) {
        EvalAltResult::ErrorParsing(..) => "SyntaxError",
        EvalAltResult::ErrorRuntime(..) => "RuntimeError",
        EvalAltResult::ErrorFunctionNotFound(..) => "FunctionNotFound",
        EvalAltResult::ErrorVariableNotFound(..) => "VariableNotFound",
        EvalAltResult::ErrorPropertyNotFound(..) => "PropertyNotFound",
        EvalAltResult::ErrorMismatchDataType(..)
        | EvalAltResult::ErrorMismatchOutputType(..)
        | EvalAltResult::ErrorIndexingType(..)
        | EvalAltResult::ErrorFor(..) => "TypeError",
        EvalAltResult::ErrorArrayBounds(..)
        | EvalAltResult::ErrorStringBounds(..)
        | EvalAltResult::ErrorBitFieldBounds(..)
        | EvalAltResult::ErrorIndexNotFound(..) => "IndexError",
        EvalAltResult::ErrorArithmetic(..) => "ArithmeticError",
        _ => "EvalError",
    }
}
