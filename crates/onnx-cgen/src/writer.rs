use std::fmt::Display;

const TAB: &str = "    ";

/// Accumulates generated C text, one indented line at a time.
#[derive(Debug, Default, Clone)]
pub struct CodeWriter {
    buffer: String,
    indent: usize,
}

impl CodeWriter {
    /// Create an empty writer at indentation level zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current indentation level.
    pub fn indent(&self) -> usize {
        self.indent
    }

    /// Indentation prefix of the current level.
    pub fn tab(&self) -> String {
        TAB.repeat(self.indent)
    }

    /// Write one line at the current indentation.
    pub fn line<T: Display>(&mut self, text: T) {
        self.buffer.push_str(&self.tab());
        self.buffer.push_str(&text.to_string());
        self.buffer.push('\n');
    }

    /// Write an empty line.
    pub fn blank(&mut self) {
        self.buffer.push('\n');
    }

    /// Write every line of a pre-rendered block at the current indentation.
    pub fn block(&mut self, text: &str) {
        for line in text.lines() {
            if line.is_empty() {
                self.blank();
            } else {
                self.line(line);
            }
        }
    }

    /// Write `{text} {` and indent the following lines.
    pub fn open<T: Display>(&mut self, text: T) {
        self.line(format!("{text} {{"));
        self.indent += 1;
    }

    /// Close the innermost brace opened with [open](Self::open).
    pub fn close(&mut self) {
        self.close_with("}");
    }

    /// Dedent and write `text`, used for closers such as `};`.
    pub fn close_with(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// The generated text.
    pub fn finish(self) -> String {
        self.buffer
    }
}
