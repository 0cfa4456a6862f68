//! Colored terminal output for release operations
//!
//! Also serves as the [`OutputSink`] that relays subprocess output while a
//! release is being built.

use crate::process::OutputSink;
use std::io::Write;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    errwtr: BufferWriter,
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputManager {
    /// Create a new output manager
    pub fn new() -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            errwtr: BufferWriter::stderr(ColorChoice::Auto),
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
        let _ = writeln!(&mut buffer, "{}", message);
        let _ = buffer.reset();
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = write!(&mut buffer, "✓");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {}", message);
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = write!(&mut buffer, "⚠");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {}", message);
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print an error message to stderr
    pub fn error(&self, message: &str) {
        let mut buffer = self.errwtr.buffer();

        if buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true)).is_err()
            || write!(&mut buffer, "✗").is_err()
            || buffer.reset().is_err()
            || buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red))).is_err()
            || writeln!(&mut buffer, " {}", message).is_err()
            || buffer.reset().is_err()
            || self.errwtr.print(&buffer).is_err()
        {
            println!("[STDERR ERROR] ✗ {}", message);
        }
    }

    /// Print a progress message
    pub fn progress(&self, message: &str) {
        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)));
        let _ = write!(&mut buffer, "⋯");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {}", message);
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print a block title on a blue background, padded by blank lines
    pub fn banner(&self, title: &str) {
        let width = title.chars().count() + 4;
        let blank = " ".repeat(width);

        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer);
        let _ = buffer.set_color(
            ColorSpec::new()
                .set_bg(Some(Color::Blue))
                .set_fg(Some(Color::White)),
        );
        let _ = write!(&mut buffer, "{}", blank);
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer);
        let _ = buffer.set_color(
            ColorSpec::new()
                .set_bg(Some(Color::Blue))
                .set_fg(Some(Color::White)),
        );
        let _ = write!(&mut buffer, "  {}  ", title);
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer);
        let _ = buffer.set_color(
            ColorSpec::new()
                .set_bg(Some(Color::Blue))
                .set_fg(Some(Color::White)),
        );
        let _ = write!(&mut buffer, "{}", blank);
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer);
        let _ = writeln!(&mut buffer);
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) {
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "    {}", message);
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print a plain message
    pub fn println(&self, message: &str) {
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "{}", message);
        let _ = self.bufwtr.print(&buffer);
    }
}

impl OutputSink for OutputManager {
    fn stdout_line(&self, line: &str) {
        self.indent(line);
    }

    fn stderr_line(&self, line: &str) {
        let mut buffer = self.errwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
        let _ = writeln!(&mut buffer, "    {}", line);
        let _ = buffer.reset();
        let _ = self.errwtr.print(&buffer);
    }

    fn progress(&self, message: &str) {
        OutputManager::progress(self, message);
    }
}
