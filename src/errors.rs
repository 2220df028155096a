//! Diagnostics accumulation.
//!
//! Backend errors never abort: they collect here with source positions
//! and are flushed once at the end of the run. No output file is written
//! while the buffer is non-empty.

use std::fmt;

/// A resolved source position, rendered as `file:line:col`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub path: String,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.col)
    }
}

/// Accumulated `file:line:col: message` lines.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn report(&mut self, pos: &Position, message: impl fmt::Display) {
        self.entries.push(format!("{}: {}", pos, message));
    }

    /// For failures with no usable position (internal checks).
    pub fn report_bare(&mut self, message: impl fmt::Display) {
        self.entries.push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_render_in_compiler_format() {
        let pos = Position {
            path: "main.gx".into(),
            line: 12,
            col: 3,
        };
        assert_eq!(pos.to_string(), "main.gx:12:3");
    }

    #[test]
    fn reports_accumulate_in_order() {
        let mut diags = Diagnostics::new();
        let pos = Position {
            path: "a.gx".into(),
            line: 1,
            col: 1,
        };
        diags.report(&pos, "first");
        diags.report(&pos, format_args!("{} not supported", "thing"));
        assert_eq!(diags.len(), 2);
        assert_eq!(
            diags.to_string(),
            "a.gx:1:1: first\na.gx:1:1: thing not supported\n"
        );
    }

    #[test]
    fn empty_buffer_prints_nothing() {
        let diags = Diagnostics::new();
        assert!(diags.is_empty());
        assert_eq!(diags.to_string(), "");
    }
}
