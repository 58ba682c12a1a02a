use std::fmt;

/// Writes the UTF-8 bytes of `value` as the body of a C string literal,
/// without the surrounding quotes.
pub fn emit_c_string_body<W: fmt::Write>(out: &mut W, value: &[u8]) -> fmt::Result {
  for &b in value {
    match b {
      b'\\' => out.write_str("\\\\")?,
      b'"' => out.write_str("\\\"")?,
      b'\n' => out.write_str("\\n")?,
      b'\r' => out.write_str("\\r")?,
      b'\t' => out.write_str("\\t")?,
      // Breaks up trigraphs such as `??=`.
      b'?' => out.write_str("\\?")?,
      0x20..=0x7e => out.write_char(b as char)?,
      // Always three digits so that a following digit is not absorbed.
      _ => write!(out, "\\{b:03o}")?,
    }
  }
  Ok(())
}

pub fn emit_c_string<W: fmt::Write>(out: &mut W, value: &str) -> fmt::Result {
  out.write_char('"')?;
  emit_c_string_body(out, value.as_bytes())?;
  out.write_char('"')
}

/// Writes `value` so that it can sit inside a `/* ... */` comment.
pub fn emit_c_comment_text<W: fmt::Write>(out: &mut W, value: &str) -> fmt::Result {
  let mut iter = value.chars().peekable();
  while let Some(ch) = iter.next() {
    match ch {
      '*' if matches!(iter.peek(), Some('/')) => {
        out.write_str("*\\/")?;
        iter.next();
      }
      '/' if matches!(iter.peek(), Some('*')) => {
        out.write_str("/\\*")?;
        iter.next();
      }
      c if c.is_control() => out.write_char(' ')?,
      c => out.write_char(c)?,
    }
  }
  Ok(())
}

/// Largest magnitude below which every integer is exactly representable.
const MAX_EXACT_INT: f64 = 9007199254740992.0;

/// Writes a number as a C expression of type `double`.
///
/// Integral values have no decimal point, other finite values always have
/// one. Non-finite values use the `<math.h>` constants.
pub fn emit_c_number<W: fmt::Write>(out: &mut W, n: f64) -> fmt::Result {
  if n.is_nan() {
    return out.write_str("NAN");
  }
  if n.is_infinite() {
    return out.write_str(if n > 0.0 { "INFINITY" } else { "-INFINITY" });
  }
  if n == 0.0 && n.is_sign_negative() {
    return out.write_str("-0.0");
  }
  if n.fract() == 0.0 {
    if n.abs() < MAX_EXACT_INT {
      return write!(out, "{}", n as i64);
    }
    // An integer literal this large would overflow, so use exponent form.
    return write!(out, "{n:e}");
  }
  // `Display` for `f64` never uses an exponent, so a fraction always shows.
  write!(out, "{n}")
}

pub fn c_number(n: f64) -> String {
  let mut out = String::new();
  emit_c_number(&mut out, n).unwrap();
  out
}

/// A C identifier fragment built from a JavaScript name.
pub fn c_ident_suffix(name: &str) -> String {
  name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect()
}
