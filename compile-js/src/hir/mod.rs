//! Basic-block intermediate representation.
//!
//! Functions are lowered into [`builder::FunctionBuilder`]s owned by a
//! [`builder::ModuleBuilder`]. Blocks hold straight-line [`Inst`]s and at most
//! one terminating [`Jump`].

pub mod builder;
pub mod fold;
pub mod order;

use serde::Serialize;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FuncId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Label(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LocalId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ParamId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArgSlotId(pub u32);

/// A variable of a specific function. Nested functions refer to their
/// ancestors' variables through this id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId {
  pub func: FuncId,
  pub index: u32,
}

/// Compile-time immediate value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Imm {
  Undefined,
  Null,
  Bool(bool),
  Num(f64),
  Str(String),
}

impl Display for Imm {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Imm::Undefined => f.write_str("undefined"),
      Imm::Null => f.write_str("null"),
      Imm::Bool(b) => write!(f, "{b}"),
      Imm::Num(n) => f.write_str(&fold::num_to_string(*n)),
      Imm::Str(s) => write!(f, "{s:?}"),
    }
  }
}

/// An instruction operand: a storage location or an immediate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum RValue {
  Var(VarId),
  Local(LocalId),
  Param(ParamId),
  ArgSlot(ArgSlotId),
  Imm(Imm),
}

impl RValue {
  pub const UNDEFINED: RValue = RValue::Imm(Imm::Undefined);

  pub fn num(v: f64) -> RValue {
    RValue::Imm(Imm::Num(v))
  }

  pub fn str(v: impl Into<String>) -> RValue {
    RValue::Imm(Imm::Str(v.into()))
  }

  pub fn imm(&self) -> Option<&Imm> {
    match self {
      RValue::Imm(imm) => Some(imm),
      _ => None,
    }
  }

  pub fn is_imm(&self) -> bool {
    matches!(self, RValue::Imm(_))
  }
}

impl Display for RValue {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      RValue::Var(v) => write!(f, "var{}.{}", v.func.0, v.index),
      RValue::Local(l) => write!(f, "loc{}", l.0),
      RValue::Param(p) => write!(f, "par{}", p.0),
      RValue::ArgSlot(a) => write!(f, "arg{}", a.0),
      RValue::Imm(imm) => imm.fmt(f),
    }
  }
}

/// Operator opcodes. Conditional branch opcodes mirror the relational
/// binary opcodes at a fixed distance, see [`OpCode::to_cond`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum OpCode {
  // Binary.
  StrictEq = 0,
  StrictNe = 1,
  LooseEq = 2,
  LooseNe = 3,
  Lt = 4,
  Le = 5,
  ShlN = 6,
  SrN = 7,
  AsrN = 8,
  Add = 9,
  AddN = 10,
  SubN = 11,
  MulN = 12,
  DivN = 13,
  ModN = 14,
  OrN = 15,
  XorN = 16,
  AndN = 17,
  In = 18,
  Instanceof = 19,
  Delete = 20,

  // Unary.
  NegN = 21,
  LogNot = 22,
  BinNotN = 23,
  Typeof = 24,
  ToNumber = 25,
  ToString = 26,
  ToObject = 27,

  // Conditional branches.
  IfTrue = 31,
  IfStrictEq = 32,
  IfStrictNe = 33,
  IfLooseEq = 34,
  IfLooseNe = 35,
  IfLt = 36,
  IfLe = 37,
}

pub const COND_BRANCH_OFFSET: u8 = OpCode::IfStrictEq as u8 - OpCode::StrictEq as u8;

const ALL_OPCODES: [OpCode; 35] = [
  OpCode::StrictEq,
  OpCode::StrictNe,
  OpCode::LooseEq,
  OpCode::LooseNe,
  OpCode::Lt,
  OpCode::Le,
  OpCode::ShlN,
  OpCode::SrN,
  OpCode::AsrN,
  OpCode::Add,
  OpCode::AddN,
  OpCode::SubN,
  OpCode::MulN,
  OpCode::DivN,
  OpCode::ModN,
  OpCode::OrN,
  OpCode::XorN,
  OpCode::AndN,
  OpCode::In,
  OpCode::Instanceof,
  OpCode::Delete,
  OpCode::NegN,
  OpCode::LogNot,
  OpCode::BinNotN,
  OpCode::Typeof,
  OpCode::ToNumber,
  OpCode::ToString,
  OpCode::ToObject,
  OpCode::IfTrue,
  OpCode::IfStrictEq,
  OpCode::IfStrictNe,
  OpCode::IfLooseEq,
  OpCode::IfLooseNe,
  OpCode::IfLt,
  OpCode::IfLe,
];

impl OpCode {
  pub fn from_repr(v: u8) -> Option<OpCode> {
    ALL_OPCODES.iter().copied().find(|op| *op as u8 == v)
  }

  pub fn is_binary(self) -> bool {
    (self as u8) <= OpCode::Delete as u8
  }

  pub fn is_unary(self) -> bool {
    (OpCode::NegN as u8..=OpCode::ToObject as u8).contains(&(self as u8))
  }

  pub fn is_cond(self) -> bool {
    (OpCode::IfTrue as u8..=OpCode::IfLe as u8).contains(&(self as u8))
  }

  /// Relational binary opcodes have a branching counterpart.
  pub fn has_cond(self) -> bool {
    (OpCode::StrictEq as u8..=OpCode::Le as u8).contains(&(self as u8))
  }

  pub fn to_cond(self) -> OpCode {
    assert!(self.has_cond(), "{self:?} has no conditional branch form");
    OpCode::from_repr(self as u8 + COND_BRANCH_OFFSET).unwrap()
  }

  pub fn from_cond(self) -> OpCode {
    assert!(
      self.is_cond() && self != OpCode::IfTrue,
      "{self:?} is not a relational branch"
    );
    OpCode::from_repr(self as u8 - COND_BRANCH_OFFSET).unwrap()
  }

  /// Operand order does not affect the result. Generic `Add` is excluded
  /// since string concatenation is not commutative.
  pub fn is_commutative(self) -> bool {
    matches!(
      self,
      OpCode::StrictEq
        | OpCode::StrictNe
        | OpCode::LooseEq
        | OpCode::LooseNe
        | OpCode::AddN
        | OpCode::MulN
        | OpCode::OrN
        | OpCode::XorN
        | OpCode::AndN
    )
  }

  pub fn mnemonic(self) -> &'static str {
    match self {
      OpCode::StrictEq => "strict_eq",
      OpCode::StrictNe => "strict_ne",
      OpCode::LooseEq => "loose_eq",
      OpCode::LooseNe => "loose_ne",
      OpCode::Lt => "lt",
      OpCode::Le => "le",
      OpCode::ShlN => "shl_n",
      OpCode::SrN => "sr_n",
      OpCode::AsrN => "asr_n",
      OpCode::Add => "add",
      OpCode::AddN => "add_n",
      OpCode::SubN => "sub_n",
      OpCode::MulN => "mul_n",
      OpCode::DivN => "div_n",
      OpCode::ModN => "mod_n",
      OpCode::OrN => "or_n",
      OpCode::XorN => "xor_n",
      OpCode::AndN => "and_n",
      OpCode::In => "in",
      OpCode::Instanceof => "instanceof",
      OpCode::Delete => "delete",
      OpCode::NegN => "neg_n",
      OpCode::LogNot => "log_not",
      OpCode::BinNotN => "bin_not_n",
      OpCode::Typeof => "typeof",
      OpCode::ToNumber => "to_number",
      OpCode::ToString => "to_string",
      OpCode::ToObject => "to_object",
      OpCode::IfTrue => "if_true",
      OpCode::IfStrictEq => "if_strict_eq",
      OpCode::IfStrictNe => "if_strict_ne",
      OpCode::IfLooseEq => "if_loose_eq",
      OpCode::IfLooseNe => "if_loose_ne",
      OpCode::IfLt => "if_lt",
      OpCode::IfLe => "if_le",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CreateKind {
  Object,
  Array { len: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SysConst {
  /// The value of the exception that entered the current catch block.
  Thrown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AsmPart {
  Text(String),
  Binding(usize),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Callee {
  Ind(RValue),
  /// A call through `copy`, a copy of `var` taken before the arguments were
  /// evaluated. Resolved to `Direct` or `Ind(copy)` once the module is known.
  Pinned { var: VarId, copy: RValue },
  /// A call to a statically known function. The closure value is kept for
  /// the environment it captured.
  Direct { func: FuncId, closure: RValue },
  Cons(RValue),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Inst {
  Closure {
    dest: RValue,
    func: FuncId,
  },
  Create {
    dest: RValue,
    kind: CreateKind,
  },
  CreateArguments {
    dest: RValue,
  },
  LoadSc {
    dest: RValue,
    sc: SysConst,
  },
  EndTry {
    index: u32,
  },
  /// Native code splice. Results come first in `bindings`.
  Asm {
    bindings: Vec<RValue>,
    result_count: usize,
    parts: Vec<AsmPart>,
  },
  Assign {
    dest: RValue,
    src: RValue,
  },
  Binop {
    op: OpCode,
    dest: RValue,
    a: RValue,
    b: RValue,
  },
  Unop {
    op: OpCode,
    dest: RValue,
    a: RValue,
  },
  Get {
    dest: RValue,
    obj: RValue,
    key: RValue,
  },
  Put {
    obj: RValue,
    key: RValue,
    value: RValue,
  },
  /// Arguments, with `this` first, are staged in arg slots `0..argc`.
  Call {
    dest: Option<RValue>,
    callee: Callee,
    argc: u32,
  },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Jump {
  Ret(RValue),
  Throw(RValue),
  Goto(Label),
  BeginTry {
    index: u32,
    on_catch: Label,
    on_body: Label,
  },
  Switch {
    value: RValue,
    cases: Vec<(i32, Label)>,
    default: Label,
  },
  IfTrue {
    value: RValue,
    on_true: Label,
    on_false: Label,
  },
  If {
    op: OpCode,
    a: RValue,
    b: RValue,
    on_true: Label,
    on_false: Label,
  },
}

impl Jump {
  /// Target labels in declaration order.
  pub fn targets(&self) -> Vec<Label> {
    match self {
      Jump::Ret(_) | Jump::Throw(_) => Vec::new(),
      Jump::Goto(l) => vec![*l],
      Jump::BeginTry {
        on_catch, on_body, ..
      } => vec![*on_body, *on_catch],
      Jump::Switch { cases, default, .. } => cases
        .iter()
        .map(|(_, l)| *l)
        .chain(std::iter::once(*default))
        .collect(),
      Jump::IfTrue {
        on_true, on_false, ..
      }
      | Jump::If {
        on_true, on_false, ..
      } => vec![*on_true, *on_false],
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Storage {
  Local(LocalId),
  Param(ParamId),
  Env(u32),
}

/// Builder-level variable. Storage is decided by escape analysis once the
/// owning function is complete.
#[derive(Clone, Debug, Serialize)]
pub struct Var {
  pub name: String,
  pub level: u32,
  pub param: Option<ParamId>,
  pub accessed: bool,
  pub escapes: bool,
  pub func_ref: Option<FuncId>,
  pub storage: Option<Storage>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cond_opcodes_are_offset_binary_opcodes() {
    let pairs = [
      (OpCode::StrictEq, OpCode::IfStrictEq),
      (OpCode::StrictNe, OpCode::IfStrictNe),
      (OpCode::LooseEq, OpCode::IfLooseEq),
      (OpCode::LooseNe, OpCode::IfLooseNe),
      (OpCode::Lt, OpCode::IfLt),
      (OpCode::Le, OpCode::IfLe),
    ];
    for (bin, cond) in pairs {
      assert_eq!(bin as u8 + COND_BRANCH_OFFSET, cond as u8);
      assert_eq!(bin.to_cond(), cond);
      assert_eq!(cond.from_cond(), bin);
      assert!(bin.is_binary() && cond.is_cond());
    }
    assert!(!OpCode::Add.has_cond());
  }

  #[test]
  fn opcode_categories_are_disjoint() {
    for op in ALL_OPCODES {
      let cats = [op.is_binary(), op.is_unary(), op.is_cond()];
      assert_eq!(cats.iter().filter(|c| **c).count(), 1, "{op:?}");
      assert_eq!(OpCode::from_repr(op as u8), Some(op));
    }
  }

  #[test]
  fn generic_add_is_not_commutative() {
    assert!(!OpCode::Add.is_commutative());
    assert!(OpCode::AddN.is_commutative());
    assert!(!OpCode::SubN.is_commutative());
  }
}
