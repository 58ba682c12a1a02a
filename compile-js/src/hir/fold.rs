use super::Imm;
use super::Imm::*;
use super::OpCode;
use super::OpCode::*;
use std::cmp::Ordering;

fn is_js_whitespace(ch: char) -> bool {
  matches!(
    ch,
    '\u{0009}'
      | '\u{000B}'
      | '\u{000C}'
      | '\u{0020}'
      | '\u{00A0}'
      | '\u{FEFF}'
      | '\u{000A}'
      | '\u{000D}'
      | '\u{2028}'
      | '\u{2029}'
  ) || (ch != '\u{180E}' && ch.is_whitespace() && !ch.is_ascii())
}

fn parse_int_digits(digits: &str, radix: u32) -> Option<f64> {
  if digits.is_empty() {
    return None;
  }
  let mut v = 0.0_f64;
  for ch in digits.chars() {
    v = v * radix as f64 + ch.to_digit(radix)? as f64;
  }
  Some(v)
}

// https://tc39.es/ecma262/multipage/abstract-operations.html#sec-stringtonumber
pub fn coerce_str_to_num(raw: &str) -> f64 {
  let raw = raw.trim_matches(is_js_whitespace);
  if raw.is_empty() {
    return 0.0;
  };
  for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
    if let Some(digits) = raw.strip_prefix(prefix) {
      return parse_int_digits(digits, radix).unwrap_or(f64::NAN);
    }
  }
  let (sign, body) = match raw.as_bytes()[0] {
    b'+' => (1.0, &raw[1..]),
    b'-' => (-1.0, &raw[1..]),
    _ => (1.0, raw),
  };
  if body == "Infinity" {
    return sign * f64::INFINITY;
  };

  let mut saw_digit = false;
  let mut saw_dot = false;
  let mut saw_exp = false;
  let mut exp_digits = 0;
  let mut prev = ' ';
  for ch in body.chars() {
    match ch {
      '0'..='9' if saw_exp => exp_digits += 1,
      '0'..='9' => saw_digit = true,
      '.' if !saw_dot && !saw_exp => saw_dot = true,
      'e' | 'E' if saw_digit && !saw_exp => saw_exp = true,
      '+' | '-' if matches!(prev, 'e' | 'E') => {}
      _ => return f64::NAN,
    }
    prev = ch;
  }
  if !saw_digit || (saw_exp && exp_digits == 0) {
    return f64::NAN;
  }
  body.parse::<f64>().map(|v| sign * v).unwrap_or(f64::NAN)
}

// https://tc39.es/ecma262/multipage/abstract-operations.html#sec-tonumber
pub fn to_number(v: &Imm) -> f64 {
  match v {
    Undefined => f64::NAN,
    Null => 0.0,
    Bool(b) => *b as u8 as f64,
    Num(n) => *n,
    Str(s) => coerce_str_to_num(s),
  }
}

// https://tc39.es/ecma262/multipage/abstract-operations.html#sec-touint32
pub fn to_uint32(n: f64) -> u32 {
  if !n.is_finite() || n == 0.0 {
    return 0;
  }
  n.trunc().rem_euclid(4294967296.0) as u32
}

pub fn to_int32(n: f64) -> i32 {
  to_uint32(n) as i32
}

pub fn to_boolean(v: &Imm) -> bool {
  match v {
    Undefined | Null => false,
    Bool(b) => *b,
    Num(n) => !n.is_nan() && *n != 0.0,
    Str(s) => !s.is_empty(),
  }
}

/// Number::toString(10).
// https://tc39.es/ecma262/multipage/ecmascript-data-types-and-values.html#sec-numeric-types-number-tostring
pub fn num_to_string(v: f64) -> String {
  if v.is_nan() {
    return "NaN".into();
  }
  if v == 0.0 {
    return "0".into();
  }
  if v.is_infinite() {
    return if v > 0.0 { "Infinity" } else { "-Infinity" }.into();
  }
  if v < 0.0 {
    return format!("-{}", num_to_string(-v));
  }

  // Shortest round-tripping digits, as `d.ddddde<exp>`.
  let sci = format!("{:e}", v);
  let (mantissa, exp) = sci.split_once('e').unwrap();
  let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
  let k = digits.len() as i32;
  let n = exp.parse::<i32>().unwrap() + 1;

  if k <= n && n <= 21 {
    format!("{}{}", digits, "0".repeat((n - k) as usize))
  } else if 0 < n && n <= 21 {
    format!("{}.{}", &digits[..n as usize], &digits[n as usize..])
  } else if -6 < n && n <= 0 {
    format!("0.{}{}", "0".repeat((-n) as usize), digits)
  } else {
    let e = n - 1;
    let sign = if e < 0 { '-' } else { '+' };
    if k == 1 {
      format!("{}e{}{}", digits, sign, e.abs())
    } else {
      format!("{}.{}e{}{}", &digits[..1], &digits[1..], sign, e.abs())
    }
  }
}

pub fn to_string(v: &Imm) -> String {
  match v {
    Undefined => "undefined".into(),
    Null => "null".into(),
    Bool(b) => b.to_string(),
    Num(n) => num_to_string(*n),
    Str(s) => s.clone(),
  }
}

pub fn type_of(v: &Imm) -> &'static str {
  match v {
    Undefined => "undefined",
    Null => "object",
    Bool(_) => "boolean",
    Num(_) => "number",
    Str(_) => "string",
  }
}

// Strings compare by UTF-16 code units.
// https://tc39.es/ecma262/multipage/abstract-operations.html#sec-islessthan
fn js_cmp(a: &Imm, b: &Imm) -> Option<Ordering> {
  match (a, b) {
    (Str(a), Str(b)) => Some(a.encode_utf16().cmp(b.encode_utf16())),
    (a, b) => to_number(a).partial_cmp(&to_number(b)),
  }
}

pub fn js_strict_eq(a: &Imm, b: &Imm) -> bool {
  match (a, b) {
    (Undefined, Undefined) | (Null, Null) => true,
    (Bool(a), Bool(b)) => a == b,
    (Num(a), Num(b)) => a == b,
    (Str(a), Str(b)) => a == b,
    _ => false,
  }
}

// https://tc39.es/ecma262/multipage/abstract-operations.html#sec-islooselyequal
pub fn js_loose_eq(a: &Imm, b: &Imm) -> bool {
  match (a, b) {
    (Undefined | Null, Undefined | Null) => true,
    (Undefined | Null, _) | (_, Undefined | Null) => false,
    (Num(_), Str(_)) | (Str(_), Num(_)) | (Bool(_), _) | (_, Bool(_)) => {
      to_number(a) == to_number(b)
    }
    _ => js_strict_eq(a, b),
  }
}

fn shift_count(b: &Imm) -> u32 {
  to_uint32(to_number(b)) & 0x1f
}

/// Evaluates a binary opcode over immediates, or None if the result can only
/// be known at run time.
pub fn fold_binop(op: OpCode, a: &Imm, b: &Imm) -> Option<Imm> {
  let num = to_number;
  #[rustfmt::skip]
  let res = match (op, a, b) {
    (StrictEq, a, b) => Bool(js_strict_eq(a, b)),
    (StrictNe, a, b) => Bool(!js_strict_eq(a, b)),
    (LooseEq, a, b) => Bool(js_loose_eq(a, b)),
    (LooseNe, a, b) => Bool(!js_loose_eq(a, b)),
    (Lt, a, b) => Bool(js_cmp(a, b).is_some_and(|c| c.is_lt())),
    (Le, a, b) => Bool(js_cmp(a, b).is_some_and(|c| c.is_le())),
    (ShlN, a, b) => Num(to_int32(num(a)).wrapping_shl(shift_count(b)) as f64),
    (SrN, a, b) => Num(to_uint32(num(a)).wrapping_shr(shift_count(b)) as f64),
    (AsrN, a, b) => Num(to_int32(num(a)).wrapping_shr(shift_count(b)) as f64),
    (Add, Str(_), _) | (Add, _, Str(_)) => Str(format!("{}{}", to_string(a), to_string(b))),
    (Add, a, b) => Num(num(a) + num(b)),
    (AddN, a, b) => Num(num(a) + num(b)),
    (SubN, a, b) => Num(num(a) - num(b)),
    (MulN, a, b) => Num(num(a) * num(b)),
    (DivN, a, b) => Num(num(a) / num(b)),
    (ModN, a, b) => Num(num(a) % num(b)),
    (OrN, a, b) => Num((to_int32(num(a)) | to_int32(num(b))) as f64),
    (XorN, a, b) => Num((to_int32(num(a)) ^ to_int32(num(b))) as f64),
    (AndN, a, b) => Num((to_int32(num(a)) & to_int32(num(b))) as f64),
    // `in` and `instanceof` throw on primitive right operands; deleting from a
    // primitive still needs ToObject at run time.
    (In | Instanceof | Delete, _, _) => return None,
    _ => panic!("{op:?} is not a binary opcode"),
  };
  Some(res)
}

pub fn fold_unop(op: OpCode, a: &Imm) -> Option<Imm> {
  #[rustfmt::skip]
  let res = match op {
    NegN => Num(-to_number(a)),
    LogNot => Bool(!to_boolean(a)),
    BinNotN => Num((!to_int32(to_number(a))) as f64),
    Typeof => Str(type_of(a).into()),
    ToNumber => Num(to_number(a)),
    ToString => Str(to_string(a)),
    // Boxing allocates a fresh object; null and undefined throw.
    ToObject => return None,
    _ => panic!("{op:?} is not a unary opcode"),
  };
  Some(res)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn n(v: f64) -> Imm {
    Num(v)
  }

  fn s(v: &str) -> Imm {
    Str(v.into())
  }

  fn assert_num(res: Option<Imm>, expected: f64) {
    match res {
      Some(Num(v)) if expected.is_nan() => assert!(v.is_nan(), "expected NaN, got {v}"),
      Some(Num(v)) => {
        assert_eq!(v, expected);
        assert_eq!(v.is_sign_negative(), expected.is_sign_negative(), "sign of {v}");
      }
      other => panic!("expected number {expected}, got {other:?}"),
    }
  }

  #[test]
  fn number_to_string_matches_js() {
    let cases = [
      (0.0, "0"),
      (-0.0, "0"),
      (1.0, "1"),
      (-5.0, "-5"),
      (0.5, "0.5"),
      (123.456, "123.456"),
      (1e21, "1e+21"),
      (1e20, "100000000000000000000"),
      (1.5e-7, "1.5e-7"),
      (0.000001, "0.000001"),
      (1e-7, "1e-7"),
      (f64::NAN, "NaN"),
      (f64::INFINITY, "Infinity"),
      (f64::NEG_INFINITY, "-Infinity"),
      (0.1 + 0.2, "0.30000000000000004"),
      (2f64.powi(53), "9007199254740992"),
    ];
    for (v, expected) in cases {
      assert_eq!(num_to_string(v), expected, "formatting {v:?}");
    }
  }

  #[test]
  fn string_to_number() {
    assert_eq!(coerce_str_to_num(""), 0.0);
    assert_eq!(coerce_str_to_num("  42\n"), 42.0);
    assert_eq!(coerce_str_to_num("-1.5e2"), -150.0);
    assert_eq!(coerce_str_to_num("0x1F"), 31.0);
    assert_eq!(coerce_str_to_num("0b101"), 5.0);
    assert_eq!(coerce_str_to_num(".5"), 0.5);
    assert_eq!(coerce_str_to_num("5."), 5.0);
    assert_eq!(coerce_str_to_num("-Infinity"), f64::NEG_INFINITY);
    assert!(coerce_str_to_num("1e").is_nan());
    assert!(coerce_str_to_num("abc").is_nan());
    assert!(coerce_str_to_num("-0x10").is_nan());
    assert!(coerce_str_to_num("1_000").is_nan());
  }

  #[test]
  fn arithmetic_propagates_nan_and_infinity() {
    assert_num(fold_binop(AddN, &n(1.0), &Undefined), f64::NAN);
    assert_num(fold_binop(DivN, &n(1.0), &n(0.0)), f64::INFINITY);
    assert_num(fold_binop(DivN, &n(-1.0), &n(0.0)), f64::NEG_INFINITY);
    assert_num(fold_binop(DivN, &n(0.0), &n(0.0)), f64::NAN);
    assert_num(fold_binop(ModN, &n(5.0), &n(0.0)), f64::NAN);
    assert_num(fold_binop(ModN, &n(f64::INFINITY), &n(2.0)), f64::NAN);
    assert_num(fold_binop(ModN, &n(-7.0), &n(2.0)), -1.0);
    assert_num(fold_binop(ModN, &n(7.5), &n(f64::INFINITY)), 7.5);
    assert_num(fold_binop(MulN, &n(f64::INFINITY), &n(0.0)), f64::NAN);
    assert_num(fold_binop(SubN, &s("10"), &n(4.0)), 6.0);
    assert_num(fold_binop(MulN, &Null, &n(3.0)), 0.0);
    assert_num(fold_binop(MulN, &n(-1.0), &n(0.0)), -0.0);
    assert_num(fold_unop(NegN, &n(0.0)), -0.0);
  }

  #[test]
  fn bitwise_truncates_to_32_bits() {
    assert_num(fold_binop(OrN, &n(4294967296.0 + 5.0), &n(0.0)), 5.0);
    assert_num(fold_binop(OrN, &n(2147483648.0), &n(0.0)), -2147483648.0);
    assert_num(fold_binop(AndN, &n(f64::NAN), &n(-1.0)), 0.0);
    assert_num(fold_binop(XorN, &n(-1.5), &n(0.0)), -1.0);
    assert_num(fold_binop(ShlN, &n(1.0), &n(33.0)), 2.0);
    assert_num(fold_binop(ShlN, &n(1.0), &n(31.0)), -2147483648.0);
    assert_num(fold_binop(AsrN, &n(-8.0), &n(1.0)), -4.0);
    assert_num(fold_binop(SrN, &n(-1.0), &n(0.0)), 4294967295.0);
    assert_num(fold_binop(SrN, &n(-8.0), &n(1.0)), 2147483644.0);
    assert_num(fold_unop(BinNotN, &n(f64::INFINITY)), -1.0);
    assert_num(fold_unop(BinNotN, &n(5.0)), -6.0);
  }

  #[test]
  fn generic_add_concatenates_in_order() {
    assert_eq!(fold_binop(Add, &s("a"), &n(1.0)), Some(s("a1")));
    assert_eq!(fold_binop(Add, &n(1.0), &s("a")), Some(s("1a")));
    assert_eq!(fold_binop(Add, &s("x"), &Undefined), Some(s("xundefined")));
    assert_eq!(fold_binop(Add, &Bool(true), &s("")), Some(s("true")));
    assert_eq!(fold_binop(Add, &s(""), &n(0.5)), Some(s("0.5")));
    assert_num(fold_binop(Add, &Bool(true), &n(1.0)), 2.0);
    assert_num(fold_binop(Add, &Null, &Undefined), f64::NAN);
  }

  #[test]
  fn equality_and_comparison() {
    assert_eq!(fold_binop(StrictEq, &n(f64::NAN), &n(f64::NAN)), Some(Bool(false)));
    assert_eq!(fold_binop(StrictEq, &n(0.0), &n(-0.0)), Some(Bool(true)));
    assert_eq!(fold_binop(StrictEq, &n(1.0), &s("1")), Some(Bool(false)));
    assert_eq!(fold_binop(LooseEq, &n(1.0), &s("1")), Some(Bool(true)));
    assert_eq!(fold_binop(LooseEq, &Null, &Undefined), Some(Bool(true)));
    assert_eq!(fold_binop(LooseEq, &Null, &n(0.0)), Some(Bool(false)));
    assert_eq!(fold_binop(LooseEq, &Bool(true), &s("1")), Some(Bool(true)));
    assert_eq!(fold_binop(LooseNe, &s(""), &n(0.0)), Some(Bool(false)));
    assert_eq!(fold_binop(Lt, &n(1.0), &n(f64::NAN)), Some(Bool(false)));
    assert_eq!(fold_binop(Le, &n(f64::NAN), &n(f64::NAN)), Some(Bool(false)));
    assert_eq!(fold_binop(Lt, &s("10"), &s("9")), Some(Bool(true)));
    assert_eq!(fold_binop(Lt, &s("10"), &n(9.0)), Some(Bool(false)));
    assert_eq!(fold_binop(Le, &Null, &n(0.0)), Some(Bool(true)));
    assert_eq!(fold_binop(Lt, &Undefined, &n(0.0)), Some(Bool(false)));
    // U+FF61 sorts after U+1F600's leading surrogate 0xD83D by code unit.
    assert_eq!(fold_binop(Lt, &s("\u{1F600}"), &s("\u{FF61}")), Some(Bool(true)));
  }

  #[test]
  fn unary_folds() {
    assert_eq!(fold_unop(Typeof, &Null), Some(s("object")));
    assert_eq!(fold_unop(Typeof, &n(1.0)), Some(s("number")));
    assert_eq!(fold_unop(LogNot, &s("")), Some(Bool(true)));
    assert_eq!(fold_unop(LogNot, &n(f64::NAN)), Some(Bool(true)));
    assert_eq!(fold_unop(ToString, &n(-0.0)), Some(s("0")));
    assert_num(fold_unop(ToNumber, &s(" 12 ")), 12.0);
    assert_num(fold_unop(ToNumber, &Undefined), f64::NAN);
    assert_eq!(fold_unop(ToObject, &n(1.0)), None);
    assert_eq!(fold_binop(In, &s("a"), &n(1.0)), None);
  }
}
