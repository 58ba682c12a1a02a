/// Byte offset to line/column translation for one source text.
///
/// Lines and columns are 1-based. Columns count Unicode scalar values, not
/// bytes, so a multi-byte character advances the column by one.
#[derive(Clone, Debug)]
pub struct LineIndex<'a> {
  text: &'a str,
  starts: Vec<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineCol {
  pub line: usize,
  pub column: usize,
}

impl<'a> LineIndex<'a> {
  pub fn new(text: &'a str) -> Self {
    let mut starts = vec![0];
    starts.extend(
      text
        .bytes()
        .enumerate()
        .filter(|(_, b)| *b == b'\n')
        .map(|(i, _)| i + 1),
    );
    Self { text, starts }
  }

  pub fn text(&self) -> &'a str {
    self.text
  }

  pub fn line_count(&self) -> usize {
    self.starts.len()
  }

  /// Zero-based line containing `offset`. Offsets past the end clamp to the
  /// last line.
  pub fn line_of(&self, offset: usize) -> usize {
    let offset = offset.min(self.text.len());
    match self.starts.binary_search(&offset) {
      Ok(idx) => idx,
      Err(idx) => idx - 1,
    }
  }

  /// Byte bounds of a zero-based line, excluding the terminating newline.
  pub fn line_bounds(&self, line: usize) -> (usize, usize) {
    let start = self.starts.get(line).copied().unwrap_or(self.text.len());
    let end = match self.starts.get(line + 1) {
      Some(next) => next - 1,
      None => self.text.len(),
    };
    let end = if end > start && self.text.as_bytes()[end - 1] == b'\r' {
      end - 1
    } else {
      end
    };
    (start, end.max(start))
  }

  pub fn line_text(&self, line: usize) -> &'a str {
    let (start, end) = self.line_bounds(line);
    &self.text[start..end]
  }

  pub fn line_col(&self, offset: usize) -> LineCol {
    let offset = clamp_to_char_boundary(self.text, offset);
    let line = self.line_of(offset);
    let (start, end) = self.line_bounds(line);
    let column = self.text[start..offset.min(end).max(start)].chars().count();
    LineCol {
      line: line + 1,
      column: column + 1,
    }
  }
}

pub fn clamp_to_char_boundary(text: &str, offset: usize) -> usize {
  let mut offset = offset.min(text.len());
  while offset > 0 && !text.is_char_boundary(offset) {
    offset -= 1;
  }
  offset
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_offsets_across_lines() {
    let index = LineIndex::new("ab\ncd\n\nefg");
    assert_eq!(index.line_count(), 4);
    assert_eq!(index.line_col(0), LineCol { line: 1, column: 1 });
    assert_eq!(index.line_col(2), LineCol { line: 1, column: 3 });
    assert_eq!(index.line_col(3), LineCol { line: 2, column: 1 });
    assert_eq!(index.line_col(6), LineCol { line: 3, column: 1 });
    assert_eq!(index.line_col(9), LineCol { line: 4, column: 3 });
    assert_eq!(index.line_col(100), LineCol { line: 4, column: 4 });
  }

  #[test]
  fn columns_count_chars_and_skip_carriage_returns() {
    let index = LineIndex::new("é = 1;\r\nx");
    assert_eq!(index.line_col(3), LineCol { line: 1, column: 3 });
    assert_eq!(index.line_text(0), "é = 1;");
    assert_eq!(index.line_text(1), "x");
  }
}
