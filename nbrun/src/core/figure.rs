//! Figure model and the per-run figure registry.
//!
//! The registry mirrors a stateful plotting API: figures are opened
//! explicitly, drawing calls target the active figure, and a drawing call with
//! nothing open creates an implicit "current" figure. The implicit figure only
//! exists while no figure is open; opening one promotes it into the registry.

use serde::{Deserialize, Serialize};

pub type FigureId = u64;

/// Default number of histogram bins.
pub const DEFAULT_HIST_BINS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Line,
    Scatter,
    Bar,
}

/// One drawn series. Bar series built from labels carry them in `categories`
/// and use `0..n` as their x positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub kind: SeriesKind,
    pub label: Option<String>,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub categories: Vec<String>,
}

impl Series {
    pub fn new(kind: SeriesKind, xs: Vec<f64>, ys: Vec<f64>) -> Self {
        Self {
            kind,
            label: None,
            xs,
            ys,
            categories: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// Bar series over category labels.
    pub fn categorical_bars(categories: Vec<String>, heights: Vec<f64>) -> Self {
        let xs = (0..heights.len()).map(|i| i as f64).collect();
        Self {
            kind: SeriesKind::Bar,
            label: None,
            xs,
            ys: heights,
            categories,
        }
    }
}

/// An in-memory plot awaiting rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub id: FigureId,
    pub title: Option<String>,
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(id: FigureId) -> Self {
        Self {
            id,
            title: None,
            xlabel: None,
            ylabel: None,
            series: Vec::new(),
        }
    }

    /// True when nothing has been drawn.
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.ys.is_empty())
    }
}

/// Pixel size of a rendered figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureSize {
    pub width: u32,
    pub height: u32,
}

/// Figure settings (TOML `[figure]` table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FigureSettings {
    pub width: u32,
    pub height: u32,
    /// Bin count used by `plt::hist(values)`.
    pub hist_bins: usize,
}

impl Default for FigureSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            hist_bins: DEFAULT_HIST_BINS,
        }
    }
}

impl FigureSettings {
    pub fn size(&self) -> FigureSize {
        FigureSize {
            width: self.width,
            height: self.height,
        }
    }
}

/// Open figures for one run.
#[derive(Debug, Default)]
pub struct FigureRegistry {
    last_id: FigureId,
    open: Vec<Figure>,
    current: Option<Figure>,
    active: Option<FigureId>,
}

impl FigureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> FigureId {
        self.last_id += 1;
        self.last_id
    }

    fn active_index(&self) -> Option<usize> {
        let id = self.active?;
        self.open.iter().position(|f| f.id == id)
    }

    /// Open a new figure and make it active.
    pub fn open(&mut self, title: Option<String>) -> FigureId {
        if let Some(implicit) = self.current.take() {
            self.open.push(implicit);
        }
        let id = self.allocate_id();
        let mut figure = Figure::new(id);
        figure.title = title;
        self.open.push(figure);
        self.active = Some(id);
        id
    }

    /// Figure targeted by stateful drawing calls.
    ///
    /// Falls back to the most recently opened figure, then to the implicit
    /// current figure, creating it if nothing exists.
    pub fn active_mut(&mut self) -> &mut Figure {
        if let Some(idx) = self.active_index() {
            return &mut self.open[idx];
        }
        if !self.open.is_empty() {
            let idx = self.open.len() - 1;
            self.active = Some(self.open[idx].id);
            return &mut self.open[idx];
        }
        let existing = self.current.as_ref().map(|f| f.id);
        let id = match existing {
            Some(id) => id,
            None => self.allocate_id(),
        };
        self.current.get_or_insert_with(|| Figure::new(id))
    }

    pub fn get(&self, id: FigureId) -> Option<&Figure> {
        self.open
            .iter()
            .chain(self.current.iter())
            .find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: FigureId) -> Option<&mut Figure> {
        self.open
            .iter_mut()
            .chain(self.current.iter_mut())
            .find(|f| f.id == id)
    }

    /// Make an existing figure the target of stateful calls.
    pub fn activate(&mut self, id: FigureId) -> bool {
        if self.open.iter().any(|f| f.id == id) {
            self.active = Some(id);
            return true;
        }
        self.current.as_ref().is_some_and(|f| f.id == id)
    }

    /// Close a figure without rendering it. Returns whether it was open.
    pub fn close(&mut self, id: FigureId) -> bool {
        if self.active == Some(id) {
            self.active = None;
        }
        if let Some(idx) = self.open.iter().position(|f| f.id == id) {
            self.open.remove(idx);
            return true;
        }
        if self.current.as_ref().is_some_and(|f| f.id == id) {
            self.current = None;
            return true;
        }
        false
    }

    /// Close whatever `active_mut` would target, without creating anything.
    pub fn close_active(&mut self) -> bool {
        let target = self
            .active_index()
            .map(|idx| self.open[idx].id)
            .or_else(|| self.open.last().map(|f| f.id))
            .or_else(|| self.current.as_ref().map(|f| f.id));
        match target {
            Some(id) => self.close(id),
            None => false,
        }
    }

    pub fn close_all(&mut self) {
        self.open.clear();
        self.current = None;
        self.active = None;
    }

    /// Remove and return the figures a render call should show.
    ///
    /// All open figures, or the implicit current figure when none are open.
    /// Returned figures are closed: a later call never yields them again.
    pub fn take_for_show(&mut self) -> Vec<Figure> {
        self.active = None;
        if self.open.is_empty() {
            return self.current.take().into_iter().collect();
        }
        std::mem::take(&mut self.open)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    /// True when neither open figures nor an implicit current figure exist.
    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.current.is_none()
    }
}

/// Bucket `values` into `bins` equal-width bins.
///
/// Returns `(centers, counts, bin_width)`. The maximum value lands in the last
/// bin. Non-finite values are ignored.
pub fn histogram(values: &[f64], bins: usize) -> (Vec<f64>, Vec<f64>, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return (Vec::new(), Vec::new(), 1.0);
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let width = span / bins as f64;

    let mut counts = vec![0.0; bins];
    for v in finite {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1.0;
    }
    let centers = (0..bins)
        .map(|i| min + width * (i as f64 + 0.5))
        .collect();
    (centers, counts, width)
}
