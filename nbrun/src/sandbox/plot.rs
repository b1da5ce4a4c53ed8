//! The `plt` scripting module.
//!
//! A small stateful figure API over the run's [`FigureRegistry`]. `show` is the
//! intercepted render entry point: it hands figures to the run's renderer and
//! closes them.

use std::cell::{Ref, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult, INT, ImmutableString, Module, Position};
use tracing::{debug, warn};

use crate::core::figure::{
    Figure, FigureId, FigureRegistry, FigureSettings, Series, SeriesKind, histogram,
};
use crate::io::raster::write_figure;
use crate::io::workspace::resolve;
use crate::render::SharedRenderer;
use crate::sandbox::capture::TextSink;

pub type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Raise a script-visible runtime error.
pub fn runtime_error(message: impl Into<String>) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(message.into()),
        Position::NONE,
    ))
}

/// Script-side handle to one figure (`Figure` in scripts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureHandle {
    pub id: FigureId,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Active,
    Figure(FigureId),
}

/// Per-run plotting state shared by every `plt` binding.
pub struct PlotContext {
    registry: RefCell<FigureRegistry>,
    renderer: SharedRenderer,
    diagnostics: TextSink,
    workdir: PathBuf,
    settings: FigureSettings,
}

impl PlotContext {
    pub fn new(
        renderer: SharedRenderer,
        diagnostics: TextSink,
        workdir: PathBuf,
        settings: FigureSettings,
    ) -> Self {
        Self {
            registry: RefCell::new(FigureRegistry::new()),
            renderer,
            diagnostics,
            workdir,
            settings,
        }
    }

    pub fn registry(&self) -> Ref<'_, FigureRegistry> {
        self.registry.borrow()
    }

    fn with_target<T>(&self, target: Target, f: impl FnOnce(&mut Figure) -> T) -> ScriptResult<T> {
        let mut registry = self.registry.borrow_mut();
        match target {
            Target::Active => Ok(f(registry.active_mut())),
            Target::Figure(id) => registry
                .get_mut(id)
                .map(f)
                .ok_or_else(|| runtime_error(format!("figure {id} is closed"))),
        }
    }

    fn add_series(&self, target: Target, series: Series) -> ScriptResult<()> {
        self.with_target(target, |fig| fig.series.push(series))
    }

    fn open(&self, title: Option<String>) -> FigureHandle {
        let id = self.registry.borrow_mut().open(title);
        FigureHandle { id }
    }

    fn activate(&self, fig: FigureHandle) -> ScriptResult<FigureHandle> {
        if self.registry.borrow_mut().activate(fig.id) {
            Ok(fig)
        } else {
            Err(runtime_error(format!("figure {} is closed", fig.id)))
        }
    }

    fn current(&self) -> FigureHandle {
        let id = self.registry.borrow_mut().active_mut().id;
        FigureHandle { id }
    }

    fn savefig(&self, target: Target, path: &str) -> ScriptResult<()> {
        let figure = self.with_target(target, |fig| fig.clone())?;
        let dest = resolve(&self.workdir, path);
        if figure.is_empty() {
            warn!(figure = figure.id, path = %dest.display(), "saving empty figure");
            self.diagnostics
                .write_line(&format!("plt: warning: figure {} is empty, saving a blank image to {path}", figure.id));
        }
        write_figure(&dest, &figure, self.settings.size())
            .map_err(|err| runtime_error(format!("savefig failed: {err:#}")))
    }

    fn close(&self, target: Target) {
        let mut registry = self.registry.borrow_mut();
        match target {
            Target::Active => registry.close_active(),
            Target::Figure(id) => registry.close(id),
        };
    }

    fn close_all(&self) {
        self.registry.borrow_mut().close_all();
    }

    /// Render and close every open figure, or the implicit current one.
    ///
    /// A figure that fails to render is reported and skipped.
    pub fn show(&self) {
        let figures = self.registry.borrow_mut().take_for_show();
        debug!(count = figures.len(), "plt::show");
        for figure in figures {
            let rendered = self.renderer.borrow_mut().figure(&figure);
            if let Err(err) = rendered {
                warn!(figure = figure.id, error = %err, "figure render failed");
                self.diagnostics
                    .write_line(&format!("plt: could not render figure {}: {err}", figure.id));
            }
        }
    }
}

fn numbers(values: &Array, what: &str) -> ScriptResult<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.as_float()
                .or_else(|_| v.as_int().map(|i| i as f64))
                .map_err(|found| runtime_error(format!("{what} must contain numbers, found {found}")))
        })
        .collect()
}

fn line_like(
    kind: SeriesKind,
    xs: Option<&Array>,
    ys: &Array,
    label: Option<String>,
) -> ScriptResult<Series> {
    let ys = numbers(ys, "y values")?;
    let xs = match xs {
        Some(xs) => numbers(xs, "x values")?,
        None => (0..ys.len()).map(|i| i as f64).collect(),
    };
    if xs.len() != ys.len() {
        return Err(runtime_error(format!(
            "x and y must have the same length, got {} and {}",
            xs.len(),
            ys.len()
        )));
    }
    Ok(Series::new(kind, xs, ys).with_label(label))
}

fn bars(labels: &Array, heights: &Array) -> ScriptResult<Series> {
    let heights = numbers(heights, "bar heights")?;
    if labels.len() != heights.len() {
        return Err(runtime_error(format!(
            "bar labels and heights must have the same length, got {} and {}",
            labels.len(),
            heights.len()
        )));
    }
    if let Ok(xs) = numbers(labels, "bar positions") {
        return Ok(Series::new(SeriesKind::Bar, xs, heights));
    }
    let categories = labels.iter().map(|l| l.to_string()).collect();
    Ok(Series::categorical_bars(categories, heights))
}

/// Upper bound on histogram bins a script may request.
pub const MAX_HIST_BINS: usize = 10_000;

fn hist(values: &Array, bins: INT) -> ScriptResult<Series> {
    let bins = usize::try_from(bins)
        .ok()
        .filter(|n| (1..=MAX_HIST_BINS).contains(n))
        .ok_or_else(|| {
            runtime_error(format!("bins must be between 1 and {MAX_HIST_BINS}, got {bins}"))
        })?;
    let values = numbers(values, "histogram values")?;
    let (centers, counts, _) = histogram(&values, bins);
    Ok(Series::new(SeriesKind::Bar, centers, counts))
}

/// Install the `plt` module, the `Figure` handle type and its methods.
pub fn register(engine: &mut Engine, ctx: Rc<PlotContext>) {
    engine
        .register_type_with_name::<FigureHandle>("Figure")
        .register_get("id", |fig: &mut FigureHandle| fig.id as INT);

    engine.register_static_module("plt", plt_module(&ctx).into());
    register_methods(engine, &ctx);
}

fn plt_module(ctx: &Rc<PlotContext>) -> Module {
    let mut module = Module::new();
    let bins = ctx.settings.hist_bins as INT;

    let c = ctx.clone();
    module.set_native_fn("figure", move || -> ScriptResult<FigureHandle> { Ok(c.open(None)) });
    let c = ctx.clone();
    module.set_native_fn("figure", move |title: ImmutableString| -> ScriptResult<FigureHandle> {
        Ok(c.open(Some(title.to_string())))
    });
    let c = ctx.clone();
    module.set_native_fn("figure", move |fig: FigureHandle| -> ScriptResult<FigureHandle> {
        c.activate(fig)
    });
    let c = ctx.clone();
    module.set_native_fn("gcf", move || -> ScriptResult<FigureHandle> { Ok(c.current()) });

    let c = ctx.clone();
    module.set_native_fn("plot", move |ys: Array| {
        c.add_series(Target::Active, line_like(SeriesKind::Line, None, &ys, None)?)
    });
    let c = ctx.clone();
    module.set_native_fn("plot", move |xs: Array, ys: Array| {
        c.add_series(Target::Active, line_like(SeriesKind::Line, Some(&xs), &ys, None)?)
    });
    let c = ctx.clone();
    module.set_native_fn("plot", move |xs: Array, ys: Array, label: ImmutableString| {
        let series = line_like(SeriesKind::Line, Some(&xs), &ys, Some(label.to_string()))?;
        c.add_series(Target::Active, series)
    });
    let c = ctx.clone();
    module.set_native_fn("scatter", move |xs: Array, ys: Array| {
        c.add_series(Target::Active, line_like(SeriesKind::Scatter, Some(&xs), &ys, None)?)
    });
    let c = ctx.clone();
    module.set_native_fn("scatter", move |xs: Array, ys: Array, label: ImmutableString| {
        let series = line_like(SeriesKind::Scatter, Some(&xs), &ys, Some(label.to_string()))?;
        c.add_series(Target::Active, series)
    });
    let c = ctx.clone();
    module.set_native_fn("bar", move |labels: Array, heights: Array| {
        c.add_series(Target::Active, bars(&labels, &heights)?)
    });
    let c = ctx.clone();
    module.set_native_fn("hist", move |values: Array| {
        c.add_series(Target::Active, hist(&values, bins)?)
    });
    let c = ctx.clone();
    module.set_native_fn("hist", move |values: Array, n: INT| {
        c.add_series(Target::Active, hist(&values, n)?)
    });

    let c = ctx.clone();
    module.set_native_fn("title", move |text: ImmutableString| {
        c.with_target(Target::Active, |fig| fig.title = Some(text.to_string()))
    });
    let c = ctx.clone();
    module.set_native_fn("xlabel", move |text: ImmutableString| {
        c.with_target(Target::Active, |fig| fig.xlabel = Some(text.to_string()))
    });
    let c = ctx.clone();
    module.set_native_fn("ylabel", move |text: ImmutableString| {
        c.with_target(Target::Active, |fig| fig.ylabel = Some(text.to_string()))
    });
    let c = ctx.clone();
    module.set_native_fn("savefig", move |path: ImmutableString| {
        c.savefig(Target::Active, path.as_str())
    });

    let c = ctx.clone();
    module.set_native_fn("close", move || -> ScriptResult<()> {
        c.close(Target::Active);
        Ok(())
    });
    let c = ctx.clone();
    module.set_native_fn("close", move |fig: FigureHandle| -> ScriptResult<()> {
        c.close(Target::Figure(fig.id));
        Ok(())
    });
    let c = ctx.clone();
    module.set_native_fn("close", move |which: ImmutableString| -> ScriptResult<()> {
        if which.as_str() != "all" {
            return Err(runtime_error(format!(
                "close expects \"all\" or a figure, got \"{which}\""
            )));
        }
        c.close_all();
        Ok(())
    });

    let c = ctx.clone();
    module.set_native_fn("show", move || -> ScriptResult<()> {
        c.show();
        Ok(())
    });
    let c = ctx.clone();
    module.set_native_fn("show", move |_ignored: Dynamic| -> ScriptResult<()> {
        c.show();
        Ok(())
    });

    module
}

fn register_methods(engine: &mut Engine, ctx: &Rc<PlotContext>) {
    let c = ctx.clone();
    engine.register_fn("plot", move |fig: &mut FigureHandle, ys: Array| {
        c.add_series(Target::Figure(fig.id), line_like(SeriesKind::Line, None, &ys, None)?)
    });
    let c = ctx.clone();
    engine.register_fn("plot", move |fig: &mut FigureHandle, xs: Array, ys: Array| {
        let series = line_like(SeriesKind::Line, Some(&xs), &ys, None)?;
        c.add_series(Target::Figure(fig.id), series)
    });
    let c = ctx.clone();
    engine.register_fn(
        "plot",
        move |fig: &mut FigureHandle, xs: Array, ys: Array, label: ImmutableString| {
            let series = line_like(SeriesKind::Line, Some(&xs), &ys, Some(label.to_string()))?;
            c.add_series(Target::Figure(fig.id), series)
        },
    );
    let c = ctx.clone();
    engine.register_fn("scatter", move |fig: &mut FigureHandle, xs: Array, ys: Array| {
        let series = line_like(SeriesKind::Scatter, Some(&xs), &ys, None)?;
        c.add_series(Target::Figure(fig.id), series)
    });
    let c = ctx.clone();
    engine.register_fn(
        "scatter",
        move |fig: &mut FigureHandle, xs: Array, ys: Array, label: ImmutableString| {
            let series = line_like(SeriesKind::Scatter, Some(&xs), &ys, Some(label.to_string()))?;
            c.add_series(Target::Figure(fig.id), series)
        },
    );
    let c = ctx.clone();
    engine.register_fn("bar", move |fig: &mut FigureHandle, labels: Array, heights: Array| {
        c.add_series(Target::Figure(fig.id), bars(&labels, &heights)?)
    });
    let c = ctx.clone();
    let bins = ctx.settings.hist_bins as INT;
    engine.register_fn("hist", move |fig: &mut FigureHandle, values: Array| {
        c.add_series(Target::Figure(fig.id), hist(&values, bins)?)
    });
    let c = ctx.clone();
    engine.register_fn("hist", move |fig: &mut FigureHandle, values: Array, n: INT| {
        c.add_series(Target::Figure(fig.id), hist(&values, n)?)
    });

    let c = ctx.clone();
    engine.register_fn("title", move |fig: &mut FigureHandle, text: ImmutableString| {
        c.with_target(Target::Figure(fig.id), |f| f.title = Some(text.to_string()))
    });
    let c = ctx.clone();
    engine.register_fn("xlabel", move |fig: &mut FigureHandle, text: ImmutableString| {
        c.with_target(Target::Figure(fig.id), |f| f.xlabel = Some(text.to_string()))
    });
    let c = ctx.clone();
    engine.register_fn("ylabel", move |fig: &mut FigureHandle, text: ImmutableString| {
        c.with_target(Target::Figure(fig.id), |f| f.ylabel = Some(text.to_string()))
    });
    let c = ctx.clone();
    engine.register_fn("savefig", move |fig: &mut FigureHandle, path: ImmutableString| {
        c.savefig(Target::Figure(fig.id), path.as_str())
    });
}
