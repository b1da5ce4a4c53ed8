//! SVG rendering for figures.
//!
//! Output is plain SVG 1.1 text: axes with five ticks per axis, one colour per
//! series, optional title/axis labels and a legend for labelled series.

use std::fmt::Write;

use crate::core::figure::{Figure, FigureSize, Series, SeriesKind};

const MARGIN_LEFT: f64 = 64.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 52.0;
const TICKS: usize = 5;

/// Categorical palette (same order as matplotlib's `tab10`).
const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Range {
    min: f64,
    max: f64,
}

impl Range {
    fn of(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut range: Option<Range> = None;
        for v in values.filter(|v| v.is_finite()) {
            range = Some(match range {
                Some(r) => Range {
                    min: r.min.min(v),
                    max: r.max.max(v),
                },
                None => Range { min: v, max: v },
            });
        }
        range
    }

    fn padded(self) -> Self {
        if self.max > self.min {
            return self;
        }
        let pad = if self.min == 0.0 { 1.0 } else { self.min.abs() * 0.5 };
        Range {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    fn span(&self) -> f64 {
        self.max - self.min
    }
}

struct Plot {
    x: Range,
    y: Range,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl Plot {
    fn px(&self, x: f64) -> f64 {
        self.left + (x - self.x.min) / self.x.span() * self.width
    }

    fn py(&self, y: f64) -> f64 {
        self.top + self.height - (y - self.y.min) / self.y.span() * self.height
    }
}

/// Render `figure` as a standalone SVG document.
pub fn render_svg(figure: &Figure, size: FigureSize) -> String {
    let width = f64::from(size.width.max(160));
    let height = f64::from(size.height.max(120));
    let bar_width = bar_width(&figure.series);

    let xs = figure.series.iter().flat_map(|s| x_extent(s, bar_width));
    let ys = figure.series.iter().flat_map(|s| {
        let baseline = (s.kind == SeriesKind::Bar).then_some(0.0);
        s.ys.iter().copied().chain(baseline)
    });
    let plot = Plot {
        x: Range::of(xs).unwrap_or(Range { min: 0.0, max: 1.0 }).padded(),
        y: Range::of(ys).unwrap_or(Range { min: 0.0, max: 1.0 }).padded(),
        left: MARGIN_LEFT,
        top: MARGIN_TOP,
        width: width - MARGIN_LEFT - MARGIN_RIGHT,
        height: height - MARGIN_TOP - MARGIN_BOTTOM,
    };

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = width,
        h = height
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    write_axes(&mut svg, &plot, &figure.series);

    for (idx, series) in figure.series.iter().enumerate() {
        write_series(&mut svg, &plot, series, PALETTE[idx % PALETTE.len()], bar_width);
    }

    if let Some(title) = &figure.title {
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="24" text-anchor="middle" font-size="16">{}</text>"#,
            width / 2.0,
            escape(title)
        );
    }
    if let Some(label) = &figure.xlabel {
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12">{}</text>"#,
            plot.left + plot.width / 2.0,
            height - 12.0,
            escape(label)
        );
    }
    if let Some(label) = &figure.ylabel {
        let cy = plot.top + plot.height / 2.0;
        let _ = writeln!(
            svg,
            r#"<text x="16" y="{cy:.1}" text-anchor="middle" font-size="12" transform="rotate(-90 16 {cy:.1})">{}</text>"#,
            escape(label)
        );
    }
    write_legend(&mut svg, &plot, &figure.series);
    svg.push_str("</svg>\n");
    svg
}

fn x_extent(series: &Series, bar_width: f64) -> Vec<f64> {
    if series.kind != SeriesKind::Bar {
        return series.xs.clone();
    }
    let half = bar_width / 2.0;
    series
        .xs
        .iter()
        .flat_map(|x| [x - half, x + half])
        .collect()
}

/// Bar width in data units: 80% of the smallest gap between bar positions.
fn bar_width(series: &[Series]) -> f64 {
    let mut positions: Vec<f64> = series
        .iter()
        .filter(|s| s.kind == SeriesKind::Bar)
        .flat_map(|s| s.xs.iter().copied())
        .filter(|x| x.is_finite())
        .collect();
    positions.sort_by(f64::total_cmp);
    positions.dedup();
    let gap = positions
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(f64::INFINITY, f64::min);
    if gap.is_finite() { gap * 0.8 } else { 0.8 }
}

fn write_axes(svg: &mut String, plot: &Plot, series: &[Series]) {
    let bottom = plot.top + plot.height;
    let right = plot.left + plot.width;
    let _ = writeln!(
        svg,
        r##"<g stroke="#333" stroke-width="1"><line x1="{l:.1}" y1="{b:.1}" x2="{r:.1}" y2="{b:.1}"/><line x1="{l:.1}" y1="{t:.1}" x2="{l:.1}" y2="{b:.1}"/></g>"##,
        l = plot.left,
        r = right,
        t = plot.top,
        b = bottom
    );

    let categories = series
        .iter()
        .find(|s| !s.categories.is_empty())
        .map(|s| (&s.xs, &s.categories));
    match categories {
        Some((xs, labels)) => {
            for (x, label) in xs.iter().zip(labels) {
                write_x_tick(svg, plot, *x, &escape(label));
            }
        }
        None => {
            for i in 0..TICKS {
                let x = plot.x.min + plot.x.span() * i as f64 / (TICKS - 1) as f64;
                write_x_tick(svg, plot, x, &format_number(x));
            }
        }
    }

    for i in 0..TICKS {
        let y = plot.y.min + plot.y.span() * i as f64 / (TICKS - 1) as f64;
        let py = plot.py(y);
        let _ = writeln!(
            svg,
            r##"<line x1="{:.1}" y1="{py:.1}" x2="{:.1}" y2="{py:.1}" stroke="#333"/><text x="{:.1}" y="{:.1}" text-anchor="end" font-size="10">{}</text>"##,
            plot.left - 4.0,
            plot.left,
            plot.left - 6.0,
            py + 3.0,
            format_number(y)
        );
    }
}

fn write_x_tick(svg: &mut String, plot: &Plot, x: f64, label: &str) {
    let px = plot.px(x);
    let bottom = plot.top + plot.height;
    let _ = writeln!(
        svg,
        r##"<line x1="{px:.1}" y1="{bottom:.1}" x2="{px:.1}" y2="{:.1}" stroke="#333"/><text x="{px:.1}" y="{:.1}" text-anchor="middle" font-size="10">{label}</text>"##,
        bottom + 4.0,
        bottom + 16.0
    );
}

fn write_series(svg: &mut String, plot: &Plot, series: &Series, color: &str, bar_width: f64) {
    let points = series
        .xs
        .iter()
        .zip(&series.ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite());
    match series.kind {
        SeriesKind::Line => {
            let coords: Vec<String> = points
                .map(|(x, y)| format!("{:.1},{:.1}", plot.px(*x), plot.py(*y)))
                .collect();
            let _ = writeln!(
                svg,
                r#"<polyline fill="none" stroke="{color}" stroke-width="1.5" points="{}"/>"#,
                coords.join(" ")
            );
        }
        SeriesKind::Scatter => {
            for (x, y) in points {
                let _ = writeln!(
                    svg,
                    r#"<circle cx="{:.1}" cy="{:.1}" r="3" fill="{color}"/>"#,
                    plot.px(*x),
                    plot.py(*y)
                );
            }
        }
        SeriesKind::Bar => {
            let base = plot.py(0.0_f64.clamp(plot.y.min, plot.y.max));
            for (x, y) in points {
                let left = plot.px(x - bar_width / 2.0);
                let right = plot.px(x + bar_width / 2.0);
                let top = plot.py(*y);
                let _ = writeln!(
                    svg,
                    r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{color}"/>"#,
                    left,
                    top.min(base),
                    (right - left).max(1.0),
                    (base - top).abs()
                );
            }
        }
    }
}

fn write_legend(svg: &mut String, plot: &Plot, series: &[Series]) {
    let labelled = series
        .iter()
        .enumerate()
        .filter_map(|(idx, s)| s.label.as_ref().map(|label| (idx, label)));
    let x = plot.left + plot.width - 120.0;
    for (row, (idx, label)) in labelled.enumerate() {
        let y = plot.top + 8.0 + row as f64 * 16.0;
        let _ = writeln!(
            svg,
            r#"<rect x="{x:.1}" y="{y:.1}" width="10" height="10" fill="{}"/><text x="{:.1}" y="{:.1}" font-size="11">{}</text>"#,
            PALETTE[idx % PALETTE.len()],
            x + 14.0,
            y + 9.0,
            escape(label)
        );
    }
}

/// Compact tick label: integers without decimals, others with up to two.
pub fn format_number(v: f64) -> String {
    if v.fract().abs() < 1e-9 && v.abs() < 1e15 {
        return format!("{}", v.round() as i64);
    }
    let text = format!("{v:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
