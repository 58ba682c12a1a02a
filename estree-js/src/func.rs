use crate::expr::Expr;
use crate::expr::Id;
use crate::expr::Pat;
use crate::node::Node;
use crate::stmt::BlockStmt;
use derive_visitor::Drive;
use derive_visitor::DriveMut;
use serde::Deserialize;

/// A function declaration or expression.
#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct Func {
  // Required for declarations, optional for expressions.
  pub id: Option<Node<Id>>,
  pub params: Vec<Node<Pat>>,
  pub body: Node<BlockStmt>,
  #[drive(skip)]
  #[serde(default)]
  pub generator: bool,
  #[drive(skip)]
  #[serde(default, rename = "async")]
  pub is_async: bool,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
#[serde(untagged)]
pub enum ArrowBody {
  Block(Node<BlockStmt>),
  Expr(Node<Expr>),
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ArrowFunc {
  pub params: Vec<Node<Pat>>,
  pub body: ArrowBody,
  #[drive(skip)]
  #[serde(default, rename = "async")]
  pub is_async: bool,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct ClassBody {
  // Members are kept opaque; classes are rejected before their bodies matter.
  #[drive(skip)]
  pub body: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, Drive, DriveMut, Deserialize)]
pub struct Class {
  pub id: Option<Node<Id>>,
  #[serde(default, rename = "superClass")]
  pub super_class: Option<Node<Expr>>,
  pub body: Node<ClassBody>,
}
