use derive_visitor::Drive;
use derive_visitor::DriveMut;
use diagnostics::lines::LineIndex;
use diagnostics::FileId;
use diagnostics::Span;
use diagnostics::TextRange;
use serde::Deserialize;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Formatter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Position {
  pub line: u32,
  pub column: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SourceLocation {
  pub start: Position,
  pub end: Position,
}

/// Source position of a node. Offsets are always present in parser output;
/// line/column information is optional and derived from source text when
/// missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Loc {
  #[serde(default)]
  pub start: u32,
  #[serde(default)]
  pub end: u32,
  #[serde(default, rename = "loc")]
  pub lines: Option<SourceLocation>,
}

impl Loc {
  pub fn new(start: u32, end: u32) -> Self {
    Self {
      start,
      end,
      lines: None,
    }
  }

  pub fn span(&self, file: FileId) -> Span {
    Span::new(file, TextRange::new(self.start, self.end))
  }

  /// 1-based line and 0-based column of the start, as ESTree reports them.
  /// Prefers the parser's own location, otherwise derives it from `source`.
  pub fn start_position(&self, source: Option<&str>) -> Option<Position> {
    if let Some(lines) = self.lines {
      return Some(lines.start);
    }
    let source = source?;
    let lc = LineIndex::new(source).line_col(self.start as usize);
    Some(Position {
      line: lc.line as u32,
      column: lc.column as u32 - 1,
    })
  }
}

/// An AST node: a position plus its syntax. Both are flattened into the same
/// JSON object, matching ESTree's layout.
#[derive(Clone, Drive, DriveMut, Deserialize)]
pub struct Node<S: Drive + DriveMut> {
  #[drive(skip)]
  #[serde(flatten)]
  pub loc: Loc,
  #[serde(flatten)]
  pub stx: Box<S>,
}

impl<S: Drive + DriveMut> Node<S> {
  pub fn new(loc: Loc, stx: S) -> Node<S> {
    Node {
      loc,
      stx: Box::new(stx),
    }
  }

  pub fn span(&self, file: FileId) -> Span {
    self.loc.span(file)
  }
}

impl<S: Debug + Drive + DriveMut> Debug for Node<S> {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    self.stx.fmt(f)
  }
}
