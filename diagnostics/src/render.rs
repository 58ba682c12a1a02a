use crate::lines::clamp_to_char_boundary;
use crate::lines::LineIndex;
use crate::Diagnostic;
use crate::FileId;
use crate::Severity;
use crate::Span;
use std::fmt::Write;

const ANSI_RESET: &str = "\u{1b}[0m";
const ANSI_BOLD_RED: &str = "\u{1b}[1;31m";
const ANSI_BOLD_YELLOW: &str = "\u{1b}[1;33m";
const ANSI_BOLD_BLUE: &str = "\u{1b}[1;34m";

/// Provides source text for rendering diagnostics.
pub trait SourceProvider {
  fn file_name(&self, file: FileId) -> Option<&str>;
  fn file_text(&self, file: FileId) -> Option<&str>;
}

#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
  pub color: bool,
  /// Multi-line spans show at most this many lines.
  pub max_lines_per_span: usize,
}

impl Default for RenderOptions {
  fn default() -> Self {
    Self {
      color: false,
      max_lines_per_span: 4,
    }
  }
}

pub fn render_diagnostic(provider: &dyn SourceProvider, diagnostic: &Diagnostic) -> String {
  render_diagnostic_with_options(provider, diagnostic, RenderOptions::default())
}

/// Renders a diagnostic as a header line followed by one annotated snippet for
/// the primary span and one per label, then any notes.
pub fn render_diagnostic_with_options(
  provider: &dyn SourceProvider,
  diagnostic: &Diagnostic,
  options: RenderOptions,
) -> String {
  let mut out = String::new();
  write_severity(&mut out, diagnostic.severity, options.color);
  writeln!(out, "[{}]: {}", diagnostic.code, diagnostic.message).unwrap();

  render_snippet(
    provider,
    &mut out,
    diagnostic.primary,
    &diagnostic.message,
    '^',
    &options,
  );
  let mut labels = diagnostic.labels.iter().collect::<Vec<_>>();
  labels.sort_by_key(|l| (l.span.file, l.span.range.start, l.span.range.end));
  for label in labels {
    render_snippet(provider, &mut out, label.span, &label.message, '-', &options);
  }

  for note in &diagnostic.notes {
    writeln!(out, "= note: {}", note).unwrap();
  }
  out
}

fn render_snippet(
  provider: &dyn SourceProvider,
  out: &mut String,
  span: Span,
  message: &str,
  marker: char,
  options: &RenderOptions,
) {
  let name = provider.file_name(span.file).unwrap_or("<unknown>");
  let Some(text) = provider.file_text(span.file) else {
    writeln!(out, " --> {}:?:?", name).unwrap();
    writeln!(out, "  | <source unavailable>").unwrap();
    return;
  };

  let index = LineIndex::new(text);
  let start = clamp_to_char_boundary(text, span.range.start as usize);
  let end = clamp_to_char_boundary(text, span.range.end as usize).max(start);
  let pos = index.line_col(start);
  writeln!(out, " --> {}:{}:{}", name, pos.line, pos.column).unwrap();

  let first_line = index.line_of(start);
  let last_line = index.line_of(if end > start { end - 1 } else { end });
  let shown_last = last_line.min(first_line + options.max_lines_per_span.max(1) - 1);
  let gutter = (shown_last + 1).to_string().len();

  writeln!(out, "{:>gutter$} |", "").unwrap();
  for line in first_line..=shown_last {
    let (line_start, line_end) = index.line_bounds(line);
    let line_text = &text[line_start..line_end];
    writeln!(out, "{:>gutter$} | {}", line + 1, line_text).unwrap();

    let from = start.clamp(line_start, line_end) - line_start;
    let to = end.clamp(line_start, line_end) - line_start;
    let pad = line_text[..from].chars().count();
    let width = line_text[from..to].chars().count().max(1);
    let mut underline = String::new();
    if options.color {
      underline.push_str(if marker == '^' {
        ANSI_BOLD_RED
      } else {
        ANSI_BOLD_BLUE
      });
    }
    underline.extend(std::iter::repeat(marker).take(width));
    if options.color {
      underline.push_str(ANSI_RESET);
    }
    write!(out, "{:>gutter$} | {}{}", "", " ".repeat(pad), underline).unwrap();
    if line == first_line && !message.is_empty() {
      write!(out, " {}", message).unwrap();
    }
    out.push('\n');
  }
  if shown_last < last_line {
    writeln!(
      out,
      "{:>gutter$} | ... ({} more lines)",
      "",
      last_line - shown_last
    )
    .unwrap();
  }
}

fn write_severity(out: &mut String, severity: Severity, color: bool) {
  if !color {
    out.push_str(severity.as_str());
    return;
  }
  out.push_str(match severity {
    Severity::Error => ANSI_BOLD_RED,
    Severity::Warning => ANSI_BOLD_YELLOW,
    Severity::Note => ANSI_BOLD_BLUE,
  });
  out.push_str(severity.as_str());
  out.push_str(ANSI_RESET);
}
