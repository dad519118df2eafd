use std::collections::VecDeque;

use ansi_to_tui::IntoText;
use ratatui::text::{Line, Span};

/// Stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One line of command output with ANSI styles already parsed
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub kind: StreamKind,
    spans: Vec<Span<'static>>,
}

impl OutputLine {
    /// Parse one line of text
    pub fn new(kind: StreamKind, content: &str) -> Self {
        let spans = match content.into_text() {
            Ok(text) => text
                .lines
                .into_iter()
                .next()
                .map(|line| line.spans)
                .unwrap_or_default(),
            Err(_) => vec![Span::raw(content.to_string())],
        };
        Self { kind, spans }
    }

    /// Split a chunk into lines
    ///
    /// A single trailing newline does not produce an empty line.
    pub fn from_chunk(kind: StreamKind, chunk: &str) -> Vec<Self> {
        let chunk = chunk.strip_suffix('\n').unwrap_or(chunk);
        chunk
            .split('\n')
            .map(|line| Self::new(kind, line.strip_suffix('\r').unwrap_or(line)))
            .collect()
    }

    /// Return the styled spans of the line
    pub fn spans(&self) -> &[Span<'static>] {
        &self.spans
    }

    /// Styled line for rendering
    pub fn to_line(&self) -> Line<'static> {
        Line::from(self.spans.clone())
    }

    /// Text without styles
    pub fn plain(&self) -> String {
        self.spans.iter().map(|s| s.content.as_ref()).collect()
    }
}

/// Bounded log of output lines
///
/// Once `max_lines` is reached the oldest line is dropped for every new one.
/// A `max_lines` of 0 keeps everything.
pub struct LogBuffer {
    lines: VecDeque<OutputLine>,
    max_lines: usize,
}

impl LogBuffer {
    /// Create an empty buffer
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines,
        }
    }

    /// Add a line, dropping the oldest one when full
    pub fn push(&mut self, line: OutputLine) {
        if self.max_lines > 0 && self.lines.len() >= self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Append every line of `chunk`, returning how many were added
    pub fn push_chunk(&mut self, kind: StreamKind, chunk: &str) -> usize {
        let lines = OutputLine::from_chunk(kind, chunk);
        let count = lines.len();
        for line in lines {
            self.push(line);
        }
        count
    }

    /// Up to `count` lines starting at `start`
    pub fn window(&self, start: usize, count: usize) -> impl Iterator<Item = &OutputLine> {
        self.lines.iter().skip(start).take(count)
    }

    /// Return the number of lines in the buffer
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate over every line, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &OutputLine> {
        self.lines.iter()
    }
}
