use crate::func::ArrowFunc;
use crate::func::Class;
use crate::func::Func;
use crate::node::Node;
use crate::operator::AssignOp;
use crate::operator::BinaryOp;
use crate::operator::LogicalOp;
use crate::operator::PropKind;
use crate::operator::UnaryOp;
use crate::operator::UpdateOp;
use derive_visitor::Drive;
use derive_visitor::DriveMut;
use serde::Deserialize;

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
  #[serde(rename = "Identifier")]
  Id(Id),
  #[serde(rename = "Literal")]
  Lit(Lit),
  #[serde(rename = "ThisExpression")]
  This(ThisExpr),
  #[serde(rename = "ArrayExpression")]
  Array(ArrayExpr),
  #[serde(rename = "ObjectExpression")]
  Object(ObjectExpr),
  #[serde(rename = "FunctionExpression")]
  Func(Func),
  #[serde(rename = "ArrowFunctionExpression")]
  Arrow(ArrowFunc),
  #[serde(rename = "ClassExpression")]
  Class(Class),
  #[serde(rename = "UnaryExpression")]
  Unary(UnaryExpr),
  #[serde(rename = "UpdateExpression")]
  Update(UpdateExpr),
  #[serde(rename = "BinaryExpression")]
  Binary(BinaryExpr),
  #[serde(rename = "LogicalExpression")]
  Logical(LogicalExpr),
  #[serde(rename = "AssignmentExpression")]
  Assign(AssignExpr),
  #[serde(rename = "ConditionalExpression")]
  Cond(CondExpr),
  #[serde(rename = "CallExpression")]
  Call(CallExpr),
  #[serde(rename = "NewExpression")]
  New(NewExpr),
  #[serde(rename = "MemberExpression")]
  Member(MemberExpr),
  #[serde(rename = "SequenceExpression")]
  Seq(SeqExpr),
  #[serde(rename = "TemplateLiteral")]
  Template(TemplateLit),
  #[serde(rename = "TaggedTemplateExpression")]
  TaggedTemplate(TaggedTemplateExpr),
  #[serde(rename = "SpreadElement")]
  Spread(SpreadElem),
  #[serde(rename = "YieldExpression")]
  Yield(YieldExpr),
  #[serde(rename = "AwaitExpression")]
  Await(AwaitExpr),

  // Destructuring assignment targets.
  #[serde(rename = "ObjectPattern")]
  ObjectPat(ObjectPat),
  #[serde(rename = "ArrayPattern")]
  ArrayPat(ArrayPat),
}

impl Expr {
  pub fn as_id(&self) -> Option<&str> {
    match self {
      Expr::Id(id) => Some(&id.name),
      _ => None,
    }
  }

  pub fn as_str_lit(&self) -> Option<&str> {
    match self {
      Expr::Lit(Lit {
        value: LitValue::Str(s),
        ..
      }) => Some(s),
      _ => None,
    }
  }

  /// Folds a string literal or a `+` concatenation of string literals.
  pub fn const_string(&self) -> Option<String> {
    match self {
      Expr::Lit(Lit {
        value: LitValue::Str(s),
        ..
      }) => Some(s.clone()),
      Expr::Binary(b) if b.operator == BinaryOp::Add => {
        let mut s = b.left.stx.const_string()?;
        s.push_str(&b.right.stx.const_string()?);
        Some(s)
      }
      _ => None,
    }
  }
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct Id {
  #[drive(skip)]
  pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LitValue {
  #[default]
  Null,
  Bool(bool),
  Num(f64),
  Str(String),
  // Values the JSON encoding cannot represent, e.g. a RegExp object.
  Other(serde_json::Value),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RegexLit {
  pub pattern: String,
  pub flags: String,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct Lit {
  #[drive(skip)]
  #[serde(default)]
  pub value: LitValue,
  #[drive(skip)]
  #[serde(default)]
  pub regex: Option<RegexLit>,
  #[drive(skip)]
  #[serde(default)]
  pub bigint: Option<String>,
  #[drive(skip)]
  #[serde(default)]
  pub raw: Option<String>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ThisExpr {}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ArrayExpr {
  // `None` is an elision (hole).
  pub elements: Vec<Option<Node<Expr>>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectMember {
  Property(Property),
  #[serde(rename = "SpreadElement")]
  Spread(SpreadElem),
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct Property {
  pub key: Node<Expr>,
  pub value: Node<Expr>,
  #[drive(skip)]
  #[serde(default)]
  pub kind: PropKind,
  #[drive(skip)]
  #[serde(default)]
  pub computed: bool,
  #[drive(skip)]
  #[serde(default)]
  pub method: bool,
  #[drive(skip)]
  #[serde(default)]
  pub shorthand: bool,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ObjectExpr {
  pub properties: Vec<Node<ObjectMember>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct UnaryExpr {
  #[drive(skip)]
  pub operator: UnaryOp,
  pub argument: Node<Expr>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct UpdateExpr {
  #[drive(skip)]
  pub operator: UpdateOp,
  #[drive(skip)]
  pub prefix: bool,
  pub argument: Node<Expr>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct BinaryExpr {
  #[drive(skip)]
  pub operator: BinaryOp,
  pub left: Node<Expr>,
  pub right: Node<Expr>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct LogicalExpr {
  #[drive(skip)]
  pub operator: LogicalOp,
  pub left: Node<Expr>,
  pub right: Node<Expr>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct AssignExpr {
  #[drive(skip)]
  pub operator: AssignOp,
  pub left: Node<Expr>,
  pub right: Node<Expr>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct CondExpr {
  pub test: Node<Expr>,
  pub consequent: Node<Expr>,
  pub alternate: Node<Expr>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct CallExpr {
  pub callee: Node<Expr>,
  pub arguments: Vec<Node<Expr>>,
  #[drive(skip)]
  #[serde(default)]
  pub optional: bool,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct NewExpr {
  pub callee: Node<Expr>,
  #[serde(default)]
  pub arguments: Vec<Node<Expr>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct MemberExpr {
  pub object: Node<Expr>,
  pub property: Node<Expr>,
  #[drive(skip)]
  #[serde(default)]
  pub computed: bool,
  #[drive(skip)]
  #[serde(default)]
  pub optional: bool,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct SeqExpr {
  pub expressions: Vec<Node<Expr>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TemplateValue {
  pub raw: String,
  #[serde(default)]
  pub cooked: Option<String>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct TemplateElement {
  #[drive(skip)]
  pub value: TemplateValue,
  #[drive(skip)]
  #[serde(default)]
  pub tail: bool,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct TemplateLit {
  pub quasis: Vec<Node<TemplateElement>>,
  pub expressions: Vec<Node<Expr>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct TaggedTemplateExpr {
  pub tag: Node<Expr>,
  pub quasi: Node<TemplateLit>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct SpreadElem {
  pub argument: Node<Expr>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct YieldExpr {
  pub argument: Option<Node<Expr>>,
  #[drive(skip)]
  #[serde(default)]
  pub delegate: bool,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct AwaitExpr {
  pub argument: Node<Expr>,
}

/// Binding and assignment patterns.
#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
#[serde(tag = "type")]
pub enum Pat {
  #[serde(rename = "Identifier")]
  Id(Id),
  #[serde(rename = "ObjectPattern")]
  Object(ObjectPat),
  #[serde(rename = "ArrayPattern")]
  Array(ArrayPat),
  #[serde(rename = "AssignmentPattern")]
  Assign(AssignPat),
  #[serde(rename = "RestElement")]
  Rest(RestPat),
  #[serde(rename = "MemberExpression")]
  Member(MemberExpr),
}

impl Pat {
  pub fn as_id(&self) -> Option<&str> {
    match self {
      Pat::Id(id) => Some(&id.name),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectPatMember {
  Property(PatProperty),
  #[serde(rename = "RestElement")]
  Rest(RestPat),
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct PatProperty {
  pub key: Node<Expr>,
  pub value: Node<Pat>,
  #[drive(skip)]
  #[serde(default)]
  pub computed: bool,
  #[drive(skip)]
  #[serde(default)]
  pub shorthand: bool,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ObjectPat {
  pub properties: Vec<Node<ObjectPatMember>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ArrayPat {
  pub elements: Vec<Option<Node<Pat>>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct AssignPat {
  pub left: Node<Pat>,
  pub right: Node<Expr>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct RestPat {
  pub argument: Node<Pat>,
}
