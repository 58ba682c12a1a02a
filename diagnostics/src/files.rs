use crate::lines::LineCol;
use crate::lines::LineIndex;
use crate::render::SourceProvider;
use crate::FileId;
use std::sync::Arc;

/// In-memory file names and source text, indexed by [`FileId`] in insertion
/// order starting from zero.
#[derive(Clone, Debug, Default)]
pub struct SimpleFiles {
  files: Vec<SimpleFile>,
}

#[derive(Clone, Debug)]
struct SimpleFile {
  name: Arc<str>,
  text: Arc<str>,
}

impl SimpleFiles {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> FileId {
    assert!(self.files.len() < u32::MAX as usize, "file count overflow");
    let file = FileId(self.files.len() as u32);
    self.files.push(SimpleFile {
      name: name.into(),
      text: text.into(),
    });
    file
  }

  /// Line and column of a byte offset, or None if the file is unknown.
  pub fn line_col(&self, file: FileId, offset: usize) -> Option<LineCol> {
    let text = self.file_text(file)?;
    Some(LineIndex::new(text).line_col(offset))
  }
}

impl SourceProvider for SimpleFiles {
  fn file_name(&self, file: FileId) -> Option<&str> {
    self.files.get(file.0 as usize).map(|f| f.name.as_ref())
  }

  fn file_text(&self, file: FileId) -> Option<&str> {
    self.files.get(file.0 as usize).map(|f| f.text.as_ref())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::render::render_diagnostic;
  use crate::Diagnostic;
  use crate::Label;
  use crate::Span;
  use crate::TextRange;

  #[test]
  fn allocates_ids_and_renders_multiple_files() {
    let mut files = SimpleFiles::new();
    let first = files.add("a.js", "var a = 1;");
    let second = files.add("b.js", "var b = 2;");
    assert_ne!(first, second);

    let diagnostic = Diagnostic::error("JSC0001", "primary", Span::new(second, TextRange::new(4, 5)))
      .with_label(Label::new(
        Span::new(first, TextRange::new(4, 5)),
        "secondary",
      ));
    let rendered = render_diagnostic(&files, &diagnostic);
    assert!(rendered.contains(" --> b.js:1:5"));
    assert!(rendered.contains(" --> a.js:1:5"));
  }

  #[test]
  fn derives_positions() {
    let mut files = SimpleFiles::new();
    let file = files.add("a.js", "x;\n  y;");
    assert_eq!(files.line_col(file, 5), Some(LineCol { line: 2, column: 3 }));
    assert_eq!(files.line_col(FileId(9), 0), None);
  }
}
