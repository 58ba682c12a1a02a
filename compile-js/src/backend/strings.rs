use super::literal::emit_c_string_body;
use itertools::Itertools;
use memchr::memmem;
use std::cmp::Reverse;
use std::fmt;
use tracing::debug;

/// All string constants of a module packed into one buffer. Strings that
/// occur inside a longer string share its bytes.
#[derive(Debug)]
pub struct StringTable {
  buf: Vec<u8>,
  /// `(offset, length)` in `buf`, indexed by string id.
  entries: Vec<(usize, usize)>,
}

/// Source characters per line of the emitted buffer.
const LINE_WIDTH: usize = 64;

impl StringTable {
  pub fn build(strings: &[String]) -> StringTable {
    // Stable, so equal lengths keep id order.
    let order = (0..strings.len()).sorted_by_key(|i| Reverse(strings[*i].len()));

    let mut buf = Vec::new();
    let mut entries = vec![(0, 0); strings.len()];
    let mut shared = 0;
    for i in order {
      let s = strings[i].as_bytes();
      let offset = match memmem::find(&buf, s) {
        Some(offset) => {
          shared += 1;
          offset
        }
        None => {
          buf.extend_from_slice(s);
          buf.len() - s.len()
        }
      };
      entries[i] = (offset, s.len());
    }
    debug!(
      strings = strings.len(),
      bytes = buf.len(),
      shared,
      "built string table"
    );
    StringTable { buf, entries }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn entry(&self, id: u32) -> (usize, usize) {
    self.entries[id as usize]
  }

  pub fn bytes(&self) -> &[u8] {
    &self.buf
  }

  /// Writes the packed buffer and its descriptor array.
  pub fn emit<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
    writeln!(out, "static const char s_strbuf[{}] =", self.buf.len() + 1)?;
    if self.buf.is_empty() {
      out.write_str("  \"\"")?;
    }
    for (i, line) in self.buf.chunks(LINE_WIDTH).enumerate() {
      if i > 0 {
        out.write_char('\n')?;
      }
      out.write_str("  \"")?;
      emit_c_string_body(out, line)?;
      out.write_char('"')?;
    }
    out.write_str(";\n")?;

    // A zero-length array is not valid C.
    writeln!(
      out,
      "static const JSStrConst s_strconst[{}] = {{",
      self.entries.len().max(1)
    )?;
    if self.entries.is_empty() {
      out.write_str("  {0, 0},\n")?;
    }
    for (offset, len) in self.entries.iter() {
      writeln!(out, "  {{{offset}, {len}}},")?;
    }
    out.write_str("};\n")
  }
}
