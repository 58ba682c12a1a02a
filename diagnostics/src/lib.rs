//! Diagnostic model shared by the AST loader, the compiler and the CLI.
//!
//! Diagnostics carry byte ranges only. Line and column numbers are derived
//! from the source text when rendering, via [`lines::LineIndex`], so producers
//! never need to track them.
//!
//! ```
//! use diagnostics::files::SimpleFiles;
//! use diagnostics::render::render_diagnostic;
//! use diagnostics::{Diagnostic, Span, TextRange};
//!
//! let mut files = SimpleFiles::new();
//! let file = files.add("main.js", "var x = y;");
//! let diag = Diagnostic::error(
//!   "JSC0001",
//!   "undeclared identifier `y`",
//!   Span::new(file, TextRange::new(8, 9)),
//! );
//!
//! let rendered = render_diagnostic(&files, &diag);
//! assert!(rendered.contains("JSC0001"));
//! assert!(rendered.contains("--> main.js:1:9"));
//! ```

pub mod files;
pub mod lines;
pub mod render;

use std::fmt::Display;
use std::fmt::Formatter;

/// A stable identifier for a file in a compilation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Default)]
pub struct FileId(pub u32);

/// A byte range in a file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct TextRange {
  pub start: u32,
  pub end: u32,
}

impl TextRange {
  pub const fn new(start: u32, end: u32) -> Self {
    Self { start, end }
  }

  /// Builds a range from `usize` offsets, saturating anything that does not
  /// fit in a `u32`.
  pub fn from_offsets(start: usize, end: usize) -> Self {
    Self {
      start: u32::try_from(start).unwrap_or(u32::MAX),
      end: u32::try_from(end).unwrap_or(u32::MAX),
    }
  }

  pub fn len(&self) -> u32 {
    self.end.saturating_sub(self.start)
  }

  pub fn is_empty(&self) -> bool {
    self.start >= self.end
  }
}

/// A range in a specific file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Span {
  pub file: FileId,
  pub range: TextRange,
}

impl Span {
  pub const fn new(file: FileId, range: TextRange) -> Self {
    Self { file, range }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum Severity {
  Error,
  Warning,
  Note,
}

impl Severity {
  pub const fn as_str(&self) -> &'static str {
    match self {
      Severity::Error => "error",
      Severity::Warning => "warning",
      Severity::Note => "note",
    }
  }
}

impl Display for Severity {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A secondary location attached to a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
  pub span: Span,
  pub message: String,
}

impl Label {
  pub fn new(span: Span, message: impl Into<String>) -> Self {
    Self {
      span,
      message: message.into(),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
  pub code: &'static str,
  pub severity: Severity,
  pub message: String,
  pub primary: Span,
  pub labels: Vec<Label>,
  pub notes: Vec<String>,
}

impl Diagnostic {
  pub fn new(
    severity: Severity,
    code: &'static str,
    message: impl Into<String>,
    primary: Span,
  ) -> Self {
    Self {
      code,
      severity,
      message: message.into(),
      primary,
      labels: Vec::new(),
      notes: Vec::new(),
    }
  }

  pub fn error(code: &'static str, message: impl Into<String>, primary: Span) -> Self {
    Self::new(Severity::Error, code, message, primary)
  }

  pub fn warning(code: &'static str, message: impl Into<String>, primary: Span) -> Self {
    Self::new(Severity::Warning, code, message, primary)
  }

  pub fn note(code: &'static str, message: impl Into<String>, primary: Span) -> Self {
    Self::new(Severity::Note, code, message, primary)
  }

  pub fn with_label(mut self, label: Label) -> Self {
    self.labels.push(label);
    self
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    self.notes.push(note.into());
    self
  }

  pub fn is_error(&self) -> bool {
    self.severity == Severity::Error
  }
}

/// Orders diagnostics by location, then code and message, so output is
/// independent of the order in which passes reported them.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
  diagnostics.sort_by(|a, b| {
    a.primary
      .file
      .cmp(&b.primary.file)
      .then(a.primary.range.start.cmp(&b.primary.range.start))
      .then(a.primary.range.end.cmp(&b.primary.range.end))
      .then(a.severity.cmp(&b.severity))
      .then(a.code.cmp(b.code))
      .then(a.message.cmp(&b.message))
  });
}
