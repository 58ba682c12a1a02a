//! Terse AST constructors, mainly for tests. Every node gets a default
//! (zero) location unless built with [`at`].

use crate::expr::*;
use crate::func::Func;
use crate::node::Loc;
use crate::node::Node;
use crate::operator::*;
use crate::stmt::*;

fn node<S: derive_visitor::Drive + derive_visitor::DriveMut>(stx: S) -> Node<S> {
  Node::new(Loc::default(), stx)
}

/// Relocates a node to the given byte range.
pub fn at<S: derive_visitor::Drive + derive_visitor::DriveMut>(
  start: u32,
  end: u32,
  mut n: Node<S>,
) -> Node<S> {
  n.loc = Loc::new(start, end);
  n
}

pub fn program(body: Vec<Node<Stmt>>) -> Node<Program> {
  node(Program {
    body,
    source_type: None,
  })
}

// Expressions.

pub fn id(name: &str) -> Node<Expr> {
  node(Expr::Id(Id { name: name.into() }))
}

pub fn pat(name: &str) -> Node<Pat> {
  node(Pat::Id(Id { name: name.into() }))
}

fn lit(value: LitValue) -> Node<Expr> {
  node(Expr::Lit(Lit {
    value,
    regex: None,
    bigint: None,
    raw: None,
  }))
}

pub fn num(v: f64) -> Node<Expr> {
  lit(LitValue::Num(v))
}

pub fn str(v: &str) -> Node<Expr> {
  lit(LitValue::Str(v.into()))
}

pub fn bool(v: bool) -> Node<Expr> {
  lit(LitValue::Bool(v))
}

pub fn null() -> Node<Expr> {
  lit(LitValue::Null)
}

pub fn this() -> Node<Expr> {
  node(Expr::This(ThisExpr {}))
}

pub fn array(elements: Vec<Node<Expr>>) -> Node<Expr> {
  node(Expr::Array(ArrayExpr {
    elements: elements.into_iter().map(Some).collect(),
  }))
}

pub fn object(props: Vec<(&str, Node<Expr>)>) -> Node<Expr> {
  node(Expr::Object(ObjectExpr {
    properties: props
      .into_iter()
      .map(|(k, value)| {
        node(ObjectMember::Property(Property {
          key: id(k),
          value,
          kind: PropKind::Init,
          computed: false,
          method: false,
          shorthand: false,
        }))
      })
      .collect(),
  }))
}

pub fn unary(operator: UnaryOp, argument: Node<Expr>) -> Node<Expr> {
  node(Expr::Unary(UnaryExpr { operator, argument }))
}

pub fn update(operator: UpdateOp, prefix: bool, argument: Node<Expr>) -> Node<Expr> {
  node(Expr::Update(UpdateExpr {
    operator,
    prefix,
    argument,
  }))
}

pub fn bin(operator: BinaryOp, left: Node<Expr>, right: Node<Expr>) -> Node<Expr> {
  node(Expr::Binary(BinaryExpr {
    operator,
    left,
    right,
  }))
}

pub fn logical(operator: LogicalOp, left: Node<Expr>, right: Node<Expr>) -> Node<Expr> {
  node(Expr::Logical(LogicalExpr {
    operator,
    left,
    right,
  }))
}

pub fn assign_op(operator: AssignOp, left: Node<Expr>, right: Node<Expr>) -> Node<Expr> {
  node(Expr::Assign(AssignExpr {
    operator,
    left,
    right,
  }))
}

pub fn assign(left: Node<Expr>, right: Node<Expr>) -> Node<Expr> {
  assign_op(AssignOp::Assign, left, right)
}

pub fn cond(test: Node<Expr>, consequent: Node<Expr>, alternate: Node<Expr>) -> Node<Expr> {
  node(Expr::Cond(CondExpr {
    test,
    consequent,
    alternate,
  }))
}

pub fn call(callee: Node<Expr>, arguments: Vec<Node<Expr>>) -> Node<Expr> {
  node(Expr::Call(CallExpr {
    callee,
    arguments,
    optional: false,
  }))
}

pub fn new(callee: Node<Expr>, arguments: Vec<Node<Expr>>) -> Node<Expr> {
  node(Expr::New(NewExpr { callee, arguments }))
}

/// `object.name`
pub fn member(object: Node<Expr>, name: &str) -> Node<Expr> {
  node(Expr::Member(MemberExpr {
    object,
    property: id(name),
    computed: false,
    optional: false,
  }))
}

/// `object[property]`
pub fn index(object: Node<Expr>, property: Node<Expr>) -> Node<Expr> {
  node(Expr::Member(MemberExpr {
    object,
    property,
    computed: true,
    optional: false,
  }))
}

pub fn seq(expressions: Vec<Node<Expr>>) -> Node<Expr> {
  node(Expr::Seq(SeqExpr { expressions }))
}

fn func(name: Option<&str>, params: &[&str], body: Vec<Node<Stmt>>) -> Func {
  Func {
    id: name.map(|n| node(Id { name: n.into() })),
    params: params.iter().map(|p| pat(p)).collect(),
    body: node(BlockStmt { body }),
    generator: false,
    is_async: false,
  }
}

pub fn func_expr(name: Option<&str>, params: &[&str], body: Vec<Node<Stmt>>) -> Node<Expr> {
  node(Expr::Func(func(name, params, body)))
}

// Statements.

pub fn func_decl(name: &str, params: &[&str], body: Vec<Node<Stmt>>) -> Node<Stmt> {
  node(Stmt::FuncDecl(func(Some(name), params, body)))
}

pub fn expr_stmt(expression: Node<Expr>) -> Node<Stmt> {
  node(Stmt::Expr(ExprStmt {
    expression,
    directive: None,
  }))
}

pub fn directive(text: &str) -> Node<Stmt> {
  node(Stmt::Expr(ExprStmt {
    expression: str(text),
    directive: Some(text.into()),
  }))
}

pub fn var_decl(kind: VarKind, decls: Vec<(&str, Option<Node<Expr>>)>) -> Node<VarDecl> {
  node(VarDecl {
    kind,
    declarations: decls
      .into_iter()
      .map(|(name, init)| node(VarDeclarator { id: pat(name), init }))
      .collect(),
  })
}

pub fn var(decls: Vec<(&str, Option<Node<Expr>>)>) -> Node<Stmt> {
  let decl = var_decl(VarKind::Var, decls);
  Node {
    loc: decl.loc,
    stx: Box::new(Stmt::VarDecl(*decl.stx)),
  }
}

pub fn block(body: Vec<Node<Stmt>>) -> Node<Stmt> {
  node(Stmt::Block(BlockStmt { body }))
}

pub fn if_(test: Node<Expr>, consequent: Node<Stmt>, alternate: Option<Node<Stmt>>) -> Node<Stmt> {
  node(Stmt::If(IfStmt {
    test,
    consequent,
    alternate,
  }))
}

pub fn ret(argument: Option<Node<Expr>>) -> Node<Stmt> {
  node(Stmt::Return(ReturnStmt { argument }))
}

pub fn throw(argument: Node<Expr>) -> Node<Stmt> {
  node(Stmt::Throw(ThrowStmt { argument }))
}

pub fn while_(test: Node<Expr>, body: Node<Stmt>) -> Node<Stmt> {
  node(Stmt::While(WhileStmt { test, body }))
}

pub fn do_while(body: Node<Stmt>, test: Node<Expr>) -> Node<Stmt> {
  node(Stmt::DoWhile(DoWhileStmt { body, test }))
}

pub fn for_(
  init: Option<ForInit>,
  test: Option<Node<Expr>>,
  update: Option<Node<Expr>>,
  body: Node<Stmt>,
) -> Node<Stmt> {
  node(Stmt::For(ForStmt {
    init,
    test,
    update,
    body,
  }))
}

pub fn for_in(left: ForInit, right: Node<Expr>, body: Node<Stmt>) -> Node<Stmt> {
  node(Stmt::ForIn(ForInStmt { left, right, body }))
}

pub fn brk(label: Option<&str>) -> Node<Stmt> {
  node(Stmt::Break(JumpStmt {
    label: label.map(|l| node(Id { name: l.into() })),
  }))
}

pub fn cont(label: Option<&str>) -> Node<Stmt> {
  node(Stmt::Continue(JumpStmt {
    label: label.map(|l| node(Id { name: l.into() })),
  }))
}

pub fn labeled(label: &str, body: Node<Stmt>) -> Node<Stmt> {
  node(Stmt::Label(LabelStmt {
    label: node(Id { name: label.into() }),
    body,
  }))
}

pub fn switch(
  discriminant: Node<Expr>,
  cases: Vec<(Option<Node<Expr>>, Vec<Node<Stmt>>)>,
) -> Node<Stmt> {
  node(Stmt::Switch(SwitchStmt {
    discriminant,
    cases: cases
      .into_iter()
      .map(|(test, consequent)| node(SwitchCase { test, consequent }))
      .collect(),
  }))
}

pub fn try_catch(
  block: Vec<Node<Stmt>>,
  param: Option<&str>,
  handler: Vec<Node<Stmt>>,
) -> Node<Stmt> {
  node(Stmt::Try(TryStmt {
    block: node(BlockStmt { body: block }),
    handler: Some(node(CatchClause {
      param: param.map(pat),
      body: node(BlockStmt { body: handler }),
    })),
    finalizer: None,
  }))
}

pub fn empty() -> Node<Stmt> {
  node(Stmt::Empty(EmptyStmt {}))
}
