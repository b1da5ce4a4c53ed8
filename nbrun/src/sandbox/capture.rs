//! Scoped capture of a run's normal and diagnostic output.
//!
//! [`CaptureScope`] redirects the engine's `print` and `debug` channels into a
//! [`CapturedOutput`] pair for as long as it lives, and restores the default
//! channels (forwarding to the tracing log) when dropped, whichever way the run
//! ended.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use rhai::Engine;
use tracing::{debug, info};

/// Append-only text buffer shared with engine callbacks.
#[derive(Debug, Clone, Default)]
pub struct TextSink(Rc<RefCell<String>>);

impl TextSink {
    pub fn write(&self, text: &str) {
        self.0.borrow_mut().push_str(text);
    }

    pub fn write_line(&self, text: &str) {
        let mut buf = self.0.borrow_mut();
        buf.push_str(text);
        buf.push('\n');
    }

    pub fn contents(&self) -> String {
        self.0.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// The two buffers of one run.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub stdout: TextSink,
    pub stderr: TextSink,
}

/// Redirection guard over an engine.
pub struct CaptureScope<'e> {
    engine: &'e mut Engine,
}

impl<'e> CaptureScope<'e> {
    /// Route `print` to `output.stdout` and `debug` to `output.stderr`.
    pub fn begin(engine: &'e mut Engine, output: &CapturedOutput) -> Self {
        let stdout = output.stdout.clone();
        engine.on_print(move |text| stdout.write_line(text));
        let stderr = output.stderr.clone();
        engine.on_debug(move |text, _source, _pos| stderr.write_line(text));
        Self { engine }
    }
}

impl Deref for CaptureScope<'_> {
    type Target = Engine;

    fn deref(&self) -> &Engine {
        self.engine
    }
}

impl Drop for CaptureScope<'_> {
    fn drop(&mut self) {
        install_default_channels(self.engine);
    }
}

/// Forward `print`/`debug` to the tracing log under the `nbrun::script` target.
pub fn install_default_channels(engine: &mut Engine) {
    engine.on_print(|text| info!(target: "nbrun::script", "{text}"));
    engine.on_debug(|text, source, pos| {
        debug!(target: "nbrun::script", source = source.unwrap_or("<script>"), %pos, "{text}");
    });
}
