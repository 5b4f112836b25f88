//! Handles all user-facing output for management commands.
//!
//! Commands never write to the process streams directly. They write through
//! an [`OutputWrapper`], which decorates a [`Sink`]: it terminates every
//! message with a line ending and colours it only when the sink is an
//! interactive terminal (or colour has been forced).

// ============================================================================
// OUTPUT SINKS: Sink trait, StdStream and OutputBuffer implementations
// ============================================================================

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use termcolor::{Ansi, Color, ColorSpec, WriteColor};

/// A writable text sink.
pub trait Sink {
    fn write_str(&mut self, text: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Whether the sink is attached to a terminal.
    fn is_interactive(&self) -> bool {
        false
    }
}

/// Ergonomic, clonable handle to a shared, mutable sink.
#[derive(Clone)]
pub struct SharedSink(Rc<RefCell<dyn Sink>>);

impl SharedSink {
    pub fn new<T: Sink + 'static>(sink: T) -> Self {
        SharedSink(Rc::new(RefCell::new(sink)))
    }

    pub fn stdout() -> Self {
        Self::new(StdStream::Stdout)
    }

    pub fn stderr() -> Self {
        Self::new(StdStream::Stderr)
    }

    pub fn write_str(&self, text: &str) -> io::Result<()> {
        self.0.borrow_mut().write_str(text)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.0.borrow_mut().flush()
    }

    pub fn is_interactive(&self) -> bool {
        self.0.borrow().is_interactive()
    }
}

/// The process standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

impl Sink for StdStream {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        match self {
            StdStream::Stdout => io::stdout().lock().write_all(text.as_bytes()),
            StdStream::Stderr => io::stderr().lock().write_all(text.as_bytes()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            StdStream::Stdout => io::stdout().flush(),
            StdStream::Stderr => io::stderr().flush(),
        }
    }

    fn is_interactive(&self) -> bool {
        match self {
            StdStream::Stdout => atty::is(atty::Stream::Stdout),
            StdStream::Stderr => atty::is(atty::Stream::Stderr),
        }
    }
}

/// OutputBuffer: collects output into a String for testing or programmatic capture.
///
/// Clones share the same buffer, so a test can hand one clone to a command
/// and read the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    buffer: Rc<RefCell<String>>,
    interactive: bool,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer that claims to be a terminal, so styles are applied.
    pub fn interactive() -> Self {
        Self {
            buffer: Rc::default(),
            interactive: true,
        }
    }

    pub fn contents(&self) -> String {
        self.buffer.borrow().clone()
    }

    pub fn shared(&self) -> SharedSink {
        SharedSink::new(self.clone())
    }
}

impl Sink for OutputBuffer {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.buffer.borrow_mut().push_str(text);
        Ok(())
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

// ============================================================================
// STYLES
// ============================================================================

/// Role-based styles for command output.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    pub error: Option<ColorSpec>,
    pub success: Option<ColorSpec>,
    pub sql_keyword: Option<ColorSpec>,
}

impl Palette {
    /// The default colour scheme.
    pub fn color() -> Self {
        Self {
            error: Some(spec(Color::Red, true)),
            success: Some(spec(Color::Green, true)),
            sql_keyword: Some(spec(Color::Yellow, true)),
        }
    }

    /// No styling at all.
    pub fn plain() -> Self {
        Self::default()
    }
}

fn spec(color: Color, bold: bool) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color)).set_bold(bold);
    spec
}

/// Wraps `text` in the ANSI sequences for `style`.
pub fn paint(style: &ColorSpec, text: &str) -> String {
    let mut out = Ansi::new(Vec::new());
    // Writes into a Vec cannot fail.
    let _ = out.set_color(style);
    let _ = out.write_all(text.as_bytes());
    let _ = out.reset();
    String::from_utf8_lossy(&out.into_inner()).into_owned()
}

// ============================================================================
// OUTPUT WRAPPER
// ============================================================================

/// Decorates a sink with line endings and terminal-only styling.
#[derive(Clone)]
pub struct OutputWrapper {
    out: SharedSink,
    style: Option<ColorSpec>,
    ending: String,
    force_color: bool,
}

impl OutputWrapper {
    pub fn new(out: SharedSink) -> Self {
        Self {
            out,
            style: None,
            ending: "\n".to_string(),
            force_color: false,
        }
    }

    pub fn with_ending(mut self, ending: impl Into<String>) -> Self {
        self.ending = ending.into();
        self
    }

    pub fn sink(&self) -> &SharedSink {
        &self.out
    }

    pub fn is_interactive(&self) -> bool {
        self.out.is_interactive()
    }

    /// Sets the default style. It is kept only when styles would be shown.
    pub fn set_style(&mut self, style: Option<ColorSpec>) {
        self.style = style.filter(|_| self.styles_enabled());
    }

    pub fn style(&self) -> Option<&ColorSpec> {
        self.style.as_ref()
    }

    /// Applies styles even when the sink is not a terminal.
    pub fn force_color(&mut self, force: bool) {
        self.force_color = force;
    }

    fn styles_enabled(&self) -> bool {
        self.force_color || self.is_interactive()
    }

    /// Styles `text` with `style` when styles are enabled for this sink.
    pub fn stylize(&self, style: Option<&ColorSpec>, text: &str) -> String {
        match style {
            Some(style) if self.styles_enabled() => paint(style, text),
            _ => text.to_string(),
        }
    }

    /// Writes `msg` with the default style.
    pub fn write(&self, msg: &str) -> io::Result<()> {
        self.write_styled(msg, self.style.as_ref())
    }

    /// Writes `msg`, appending the line ending when it is missing.
    pub fn write_styled(&self, msg: &str, style: Option<&ColorSpec>) -> io::Result<()> {
        let mut msg = msg.to_string();
        if !self.ending.is_empty() && !msg.ends_with(&self.ending) {
            msg.push_str(&self.ending);
        }
        self.out.write_str(&self.stylize(style, &msg))
    }

    pub fn flush(&self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_appends_missing_ending_once() {
        let buffer = OutputBuffer::new();
        let out = OutputWrapper::new(buffer.shared());
        out.write("hello").unwrap();
        out.write("world\n").unwrap();
        assert_eq!(buffer.contents(), "hello\nworld\n");
    }

    #[test]
    fn styles_are_dropped_for_non_interactive_sinks() {
        let buffer = OutputBuffer::new();
        let mut out = OutputWrapper::new(buffer.shared());
        out.set_style(Palette::color().error);
        assert!(out.style().is_none());
        out.write("plain").unwrap();
        assert_eq!(buffer.contents(), "plain\n");
    }

    #[test]
    fn styles_apply_on_interactive_sinks() {
        let buffer = OutputBuffer::interactive();
        let mut out = OutputWrapper::new(buffer.shared());
        out.set_style(Palette::color().success);
        out.write("done").unwrap();
        let written = buffer.contents();
        assert!(written.starts_with("\x1b["));
        assert!(written.contains("done"));
    }

    #[test]
    fn forced_colour_styles_any_sink() {
        let buffer = OutputBuffer::new();
        let mut out = OutputWrapper::new(buffer.shared());
        out.force_color(true);
        let painted = out.stylize(Palette::color().error.as_ref(), "careful");
        assert_ne!(painted, "careful");
        assert!(painted.contains("careful"));
    }

    #[test]
    fn empty_ending_writes_verbatim() {
        let buffer = OutputBuffer::new();
        let out = OutputWrapper::new(buffer.shared()).with_ending("");
        out.write("no newline").unwrap();
        assert_eq!(buffer.contents(), "no newline");
    }
}
