use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum BinaryOp {
  #[serde(rename = "==")]
  LooseEq,
  #[serde(rename = "!=")]
  LooseNe,
  #[serde(rename = "===")]
  StrictEq,
  #[serde(rename = "!==")]
  StrictNe,
  #[serde(rename = "<")]
  Lt,
  #[serde(rename = "<=")]
  Le,
  #[serde(rename = ">")]
  Gt,
  #[serde(rename = ">=")]
  Ge,
  #[serde(rename = "<<")]
  Shl,
  #[serde(rename = ">>")]
  Sar,
  #[serde(rename = ">>>")]
  Shr,
  #[serde(rename = "+")]
  Add,
  #[serde(rename = "-")]
  Sub,
  #[serde(rename = "*")]
  Mul,
  #[serde(rename = "/")]
  Div,
  #[serde(rename = "%")]
  Mod,
  #[serde(rename = "**")]
  Exp,
  #[serde(rename = "|")]
  BitOr,
  #[serde(rename = "^")]
  BitXor,
  #[serde(rename = "&")]
  BitAnd,
  #[serde(rename = "in")]
  In,
  #[serde(rename = "instanceof")]
  Instanceof,
}

impl BinaryOp {
  pub fn as_str(self) -> &'static str {
    match self {
      BinaryOp::LooseEq => "==",
      BinaryOp::LooseNe => "!=",
      BinaryOp::StrictEq => "===",
      BinaryOp::StrictNe => "!==",
      BinaryOp::Lt => "<",
      BinaryOp::Le => "<=",
      BinaryOp::Gt => ">",
      BinaryOp::Ge => ">=",
      BinaryOp::Shl => "<<",
      BinaryOp::Sar => ">>",
      BinaryOp::Shr => ">>>",
      BinaryOp::Add => "+",
      BinaryOp::Sub => "-",
      BinaryOp::Mul => "*",
      BinaryOp::Div => "/",
      BinaryOp::Mod => "%",
      BinaryOp::Exp => "**",
      BinaryOp::BitOr => "|",
      BinaryOp::BitXor => "^",
      BinaryOp::BitAnd => "&",
      BinaryOp::In => "in",
      BinaryOp::Instanceof => "instanceof",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum LogicalOp {
  #[serde(rename = "&&")]
  And,
  #[serde(rename = "||")]
  Or,
  #[serde(rename = "??")]
  Nullish,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum AssignOp {
  #[serde(rename = "=")]
  Assign,
  #[serde(rename = "+=")]
  Add,
  #[serde(rename = "-=")]
  Sub,
  #[serde(rename = "*=")]
  Mul,
  #[serde(rename = "/=")]
  Div,
  #[serde(rename = "%=")]
  Mod,
  #[serde(rename = "**=")]
  Exp,
  #[serde(rename = "<<=")]
  Shl,
  #[serde(rename = ">>=")]
  Sar,
  #[serde(rename = ">>>=")]
  Shr,
  #[serde(rename = "|=")]
  BitOr,
  #[serde(rename = "^=")]
  BitXor,
  #[serde(rename = "&=")]
  BitAnd,
  #[serde(rename = "&&=")]
  And,
  #[serde(rename = "||=")]
  Or,
  #[serde(rename = "??=")]
  Nullish,
}

impl AssignOp {
  /// The binary operator a compound assignment applies, or None for plain and
  /// logical assignment.
  pub fn binary(self) -> Option<BinaryOp> {
    Some(match self {
      AssignOp::Add => BinaryOp::Add,
      AssignOp::Sub => BinaryOp::Sub,
      AssignOp::Mul => BinaryOp::Mul,
      AssignOp::Div => BinaryOp::Div,
      AssignOp::Mod => BinaryOp::Mod,
      AssignOp::Exp => BinaryOp::Exp,
      AssignOp::Shl => BinaryOp::Shl,
      AssignOp::Sar => BinaryOp::Sar,
      AssignOp::Shr => BinaryOp::Shr,
      AssignOp::BitOr => BinaryOp::BitOr,
      AssignOp::BitXor => BinaryOp::BitXor,
      AssignOp::BitAnd => BinaryOp::BitAnd,
      AssignOp::Assign | AssignOp::And | AssignOp::Or | AssignOp::Nullish => return None,
    })
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum UnaryOp {
  #[serde(rename = "-")]
  Neg,
  #[serde(rename = "+")]
  Plus,
  #[serde(rename = "!")]
  Not,
  #[serde(rename = "~")]
  BitNot,
  #[serde(rename = "typeof")]
  Typeof,
  #[serde(rename = "void")]
  Void,
  #[serde(rename = "delete")]
  Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum UpdateOp {
  #[serde(rename = "++")]
  Inc,
  #[serde(rename = "--")]
  Dec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
  Var,
  Let,
  Const,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
  #[default]
  Init,
  Get,
  Set,
}
