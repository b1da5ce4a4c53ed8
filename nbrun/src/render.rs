//! Renderer capability injected into each run.
//!
//! Scripts never talk to a UI directly. `plt::show()` and `display(obj)` are
//! bound to the [`Renderer`] the caller passes to
//! [`sandbox::run`](crate::sandbox::run), so the host decides per run whether
//! output becomes widgets ([`HostRenderer`]) or is dropped
//! ([`HeadlessRenderer`]).

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;

use crate::core::figure::{Figure, FigureSize};
use crate::core::svg::render_svg;
use crate::core::table::Table;
use crate::core::types::Widget;

/// Host-surface rendering operations used by the display bindings.
pub trait Renderer {
    /// Render one figure. Called at most once per figure.
    fn figure(&mut self, figure: &Figure) -> Result<()>;
    /// Render a tabular value.
    fn table(&mut self, table: &Table) -> Result<()>;
    /// Render any other value as text.
    fn object(&mut self, text: &str) -> Result<()>;
}

/// Renderer handle shared between the caller and a run's bindings.
pub type SharedRenderer = Rc<RefCell<dyn Renderer>>;

/// Collects widgets for a host surface.
#[derive(Debug)]
pub struct HostRenderer {
    size: FigureSize,
    widgets: Vec<Widget>,
}

impl HostRenderer {
    pub fn new(size: FigureSize) -> Self {
        Self {
            size,
            widgets: Vec::new(),
        }
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn take_widgets(&mut self) -> Vec<Widget> {
        std::mem::take(&mut self.widgets)
    }
}

impl Renderer for HostRenderer {
    fn figure(&mut self, figure: &Figure) -> Result<()> {
        self.widgets.push(Widget::Figure {
            id: figure.id,
            title: figure.title.clone(),
            svg: render_svg(figure, self.size),
        });
        Ok(())
    }

    fn table(&mut self, table: &Table) -> Result<()> {
        self.widgets.push(Widget::Table(table.clone()));
        Ok(())
    }

    fn object(&mut self, text: &str) -> Result<()> {
        self.widgets.push(Widget::Text {
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Discards everything. Figures are still closed by `show`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessRenderer;

impl Renderer for HeadlessRenderer {
    fn figure(&mut self, _figure: &Figure) -> Result<()> {
        Ok(())
    }

    fn table(&mut self, _table: &Table) -> Result<()> {
        Ok(())
    }

    fn object(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_renderer_collects_widgets_in_order() {
        let mut host = HostRenderer::new(FigureSize {
            width: 320,
            height: 240,
        });
        let mut figure = Figure::new(7);
        figure.title = Some("admissions".to_string());
        host.object("hello").expect("object");
        host.figure(&figure).expect("figure");
        host.table(&Table::new(vec!["a".to_string()])).expect("table");

        let widgets = host.take_widgets();
        assert_eq!(widgets.len(), 3);
        assert!(matches!(&widgets[0], Widget::Text { text } if text == "hello"));
        assert!(
            matches!(&widgets[1], Widget::Figure { id: 7, title: Some(t), svg } if t == "admissions" && svg.starts_with("<svg"))
        );
        assert!(matches!(&widgets[2], Widget::Table(_)));
        assert!(host.widgets().is_empty());
    }

    #[test]
    fn widgets_serialize_with_kind_tag() {
        let widget = Widget::Text {
            text: "x".to_string(),
        };
        let json = serde_json::to_value(&widget).expect("json");
        assert_eq!(json["kind"], "text");
        assert_eq!(json["text"], "x");
    }
}
