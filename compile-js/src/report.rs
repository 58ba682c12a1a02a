use diagnostics::sort_diagnostics;
use diagnostics::Diagnostic;
use diagnostics::FileId;
use diagnostics::Label;
use diagnostics::Severity;
use diagnostics::Span;
use estree_js::node::Loc;
use tracing::debug;

pub const ERROR_CODE: &str = "JSC0001";
pub const WARNING_CODE: &str = "JSC0002";
pub const NOTE_CODE: &str = "JSC0003";

/// Accumulates diagnostics for one source file. Errors never stop the pass
/// that reports them; callers check [`Reporter::error_count`] between phases.
#[derive(Debug)]
pub struct Reporter {
  file: FileId,
  diagnostics: Vec<Diagnostic>,
  error_count: usize,
}

impl Reporter {
  pub fn new(file: FileId) -> Reporter {
    Reporter {
      file,
      diagnostics: Vec::new(),
      error_count: 0,
    }
  }

  pub fn span(&self, loc: &Loc) -> Span {
    loc.span(self.file)
  }

  fn report(&mut self, severity: Severity, loc: &Loc, message: String) {
    let code = match severity {
      Severity::Error => ERROR_CODE,
      Severity::Warning => WARNING_CODE,
      Severity::Note => NOTE_CODE,
    };
    debug!(%severity, start = loc.start, text = message.as_str(), "diagnostic");
    if severity == Severity::Error {
      self.error_count += 1;
    }
    let span = self.span(loc);
    self
      .diagnostics
      .push(Diagnostic::new(severity, code, message, span));
  }

  pub fn error(&mut self, loc: &Loc, message: impl Into<String>) {
    self.report(Severity::Error, loc, message.into());
  }

  pub fn warning(&mut self, loc: &Loc, message: impl Into<String>) {
    self.report(Severity::Warning, loc, message.into());
  }

  pub fn note(&mut self, loc: &Loc, message: impl Into<String>) {
    self.report(Severity::Note, loc, message.into());
  }

  /// An error in strict mode, otherwise a warning.
  pub fn strict_error(&mut self, strict: bool, loc: &Loc, message: impl Into<String>) {
    if strict {
      self.error(loc, message);
    } else {
      self.warning(loc, message);
      self.amend_last(|d| d.with_note("this is an error in strict mode code"));
    }
  }

  /// Points the most recent diagnostic at a second location.
  pub fn label_last(&mut self, loc: &Loc, message: impl Into<String>) {
    let label = Label::new(self.span(loc), message);
    self.amend_last(|d| d.with_label(label));
  }

  fn amend_last(&mut self, f: impl FnOnce(Diagnostic) -> Diagnostic) {
    if let Some(last) = self.diagnostics.pop() {
      self.diagnostics.push(f(last));
    }
  }

  pub fn error_count(&self) -> usize {
    self.error_count
  }

  pub fn diagnostics(&self) -> &[Diagnostic] {
    &self.diagnostics
  }

  /// The diagnostics in source order.
  pub fn into_diagnostics(mut self) -> Vec<Diagnostic> {
    sort_diagnostics(&mut self.diagnostics);
    self.diagnostics
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counts_only_errors() {
    let mut r = Reporter::new(FileId(3));
    let loc = Loc::new(4, 9);
    r.warning(&loc, "loose equality");
    r.note(&loc, "declared here");
    assert_eq!(r.error_count(), 0);
    r.strict_error(true, &loc, "read-only");
    r.strict_error(false, &loc, "read-only");
    assert_eq!(r.error_count(), 1);
    let codes: Vec<_> = r.diagnostics().iter().map(|d| d.code).collect();
    assert_eq!(codes, [WARNING_CODE, NOTE_CODE, ERROR_CODE, WARNING_CODE]);
    assert_eq!(r.diagnostics()[0].primary.file, FileId(3));
    assert_eq!(r.diagnostics()[0].primary.range.start, 4);
    assert!(r.diagnostics()[2].notes.is_empty());
    assert_eq!(r.diagnostics()[3].notes, ["this is an error in strict mode code"]);
  }

  #[test]
  fn labels_attach_to_the_latest_diagnostic() {
    let mut r = Reporter::new(FileId(1));
    r.label_last(&Loc::new(0, 1), "ignored without a diagnostic");
    r.warning(&Loc::new(20, 21), "function 'f' hides an earlier declaration");
    r.label_last(&Loc::new(9, 10), "previous declaration");
    let d = &r.diagnostics()[0];
    assert_eq!(d.labels.len(), 1);
    assert_eq!(d.labels[0].message, "previous declaration");
    assert_eq!(d.labels[0].span, Loc::new(9, 10).span(FileId(1)));
  }
}
