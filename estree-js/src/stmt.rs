use crate::expr::Expr;
use crate::expr::Id;
use crate::expr::Pat;
use crate::func::Class;
use crate::func::Func;
use crate::node::Node;
use crate::operator::VarKind;
use derive_visitor::Drive;
use derive_visitor::DriveMut;
use serde::Deserialize;

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
#[serde(tag = "type")]
pub enum Stmt {
  #[serde(rename = "BlockStatement")]
  Block(BlockStmt),
  #[serde(rename = "EmptyStatement")]
  Empty(EmptyStmt),
  #[serde(rename = "ExpressionStatement")]
  Expr(ExprStmt),
  #[serde(rename = "IfStatement")]
  If(IfStmt),
  #[serde(rename = "LabeledStatement")]
  Label(LabelStmt),
  #[serde(rename = "BreakStatement")]
  Break(JumpStmt),
  #[serde(rename = "ContinueStatement")]
  Continue(JumpStmt),
  #[serde(rename = "WithStatement")]
  With(WithStmt),
  #[serde(rename = "SwitchStatement")]
  Switch(SwitchStmt),
  #[serde(rename = "ReturnStatement")]
  Return(ReturnStmt),
  #[serde(rename = "ThrowStatement")]
  Throw(ThrowStmt),
  #[serde(rename = "TryStatement")]
  Try(TryStmt),
  #[serde(rename = "WhileStatement")]
  While(WhileStmt),
  #[serde(rename = "DoWhileStatement")]
  DoWhile(DoWhileStmt),
  #[serde(rename = "ForStatement")]
  For(ForStmt),
  #[serde(rename = "ForInStatement")]
  ForIn(ForInStmt),
  #[serde(rename = "ForOfStatement")]
  ForOf(ForInStmt),
  #[serde(rename = "DebuggerStatement")]
  Debugger(EmptyStmt),
  #[serde(rename = "FunctionDeclaration")]
  FuncDecl(Func),
  #[serde(rename = "VariableDeclaration")]
  VarDecl(VarDecl),
  #[serde(rename = "ClassDeclaration")]
  ClassDecl(Class),
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct BlockStmt {
  pub body: Vec<Node<Stmt>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct EmptyStmt {}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ExprStmt {
  pub expression: Node<Expr>,
  // Set on directive prologue entries such as "use strict".
  #[drive(skip)]
  #[serde(default)]
  pub directive: Option<String>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct IfStmt {
  pub test: Node<Expr>,
  pub consequent: Node<Stmt>,
  pub alternate: Option<Node<Stmt>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct LabelStmt {
  pub label: Node<Id>,
  pub body: Node<Stmt>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct JumpStmt {
  pub label: Option<Node<Id>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct WithStmt {
  pub object: Node<Expr>,
  pub body: Node<Stmt>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct SwitchCase {
  // None for `default`.
  pub test: Option<Node<Expr>>,
  pub consequent: Vec<Node<Stmt>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct SwitchStmt {
  pub discriminant: Node<Expr>,
  pub cases: Vec<Node<SwitchCase>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ReturnStmt {
  pub argument: Option<Node<Expr>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ThrowStmt {
  pub argument: Node<Expr>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct CatchClause {
  pub param: Option<Node<Pat>>,
  pub body: Node<BlockStmt>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct TryStmt {
  pub block: Node<BlockStmt>,
  pub handler: Option<Node<CatchClause>>,
  pub finalizer: Option<Node<BlockStmt>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct WhileStmt {
  pub test: Node<Expr>,
  pub body: Node<Stmt>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct DoWhileStmt {
  pub body: Node<Stmt>,
  pub test: Node<Expr>,
}

/// The head of a `for`, `for-in` or `for-of` loop. A declaration is tried
/// first since only it carries `declarations`.
#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
#[serde(untagged)]
pub enum ForInit {
  Var(Node<VarDecl>),
  Expr(Node<Expr>),
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ForStmt {
  pub init: Option<ForInit>,
  pub test: Option<Node<Expr>>,
  pub update: Option<Node<Expr>>,
  pub body: Node<Stmt>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ForInStmt {
  pub left: ForInit,
  pub right: Node<Expr>,
  pub body: Node<Stmt>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct VarDeclarator {
  pub id: Node<Pat>,
  pub init: Option<Node<Expr>>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct VarDecl {
  #[drive(skip)]
  pub kind: VarKind,
  pub declarations: Vec<Node<VarDeclarator>>,
}

/// The root of a script or module.
#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct Program {
  pub body: Vec<Node<Stmt>>,
  #[drive(skip)]
  #[serde(default, rename = "sourceType")]
  pub source_type: Option<String>,
}
