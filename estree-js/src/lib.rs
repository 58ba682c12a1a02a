//! ESTree JavaScript syntax tree, loaded from the JSON produced by an external
//! parser.
//!
//! Node kinds are closed enums per syntactic category ([`stmt::Stmt`],
//! [`expr::Expr`], [`expr::Pat`]), so consumers match exhaustively. Every
//! node is wrapped in [`node::Node`], which carries its source offsets.

pub mod build;
pub mod expr;
pub mod func;
pub mod node;
pub mod operator;
pub mod stmt;

use node::Node;
use stmt::Program;

/// Deserializes a `Program` node from ESTree JSON text.
pub fn parse_program_json(json: &str) -> serde_json::Result<Node<Program>> {
  serde_json::from_str(json)
}

pub fn parse_program_value(value: serde_json::Value) -> serde_json::Result<Node<Program>> {
  serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::expr::Expr;
  use crate::expr::LitValue;
  use crate::operator::BinaryOp;
  use crate::operator::VarKind;
  use crate::stmt::ForInit;
  use crate::stmt::Stmt;

  #[test]
  fn loads_function_with_offsets() {
    let json = r#"{
      "type": "Program", "start": 0, "end": 31, "sourceType": "script",
      "body": [{
        "type": "FunctionDeclaration", "start": 0, "end": 31,
        "id": {"type": "Identifier", "start": 9, "end": 10, "name": "f"},
        "params": [{"type": "Identifier", "start": 11, "end": 12, "name": "n"}],
        "generator": false, "async": false,
        "body": {"type": "BlockStatement", "start": 14, "end": 31, "body": [{
          "type": "ReturnStatement", "start": 16, "end": 29,
          "argument": {
            "type": "BinaryExpression", "start": 23, "end": 28, "operator": "<=",
            "left": {"type": "Identifier", "start": 23, "end": 24, "name": "n"},
            "right": {"type": "Literal", "start": 27, "end": 28, "value": 2, "raw": "2"}
          }
        }]}
      }]
    }"#;
    let program = parse_program_json(json).unwrap();
    assert_eq!(program.loc.end, 31);
    assert_eq!(program.stx.source_type.as_deref(), Some("script"));
    let Stmt::FuncDecl(func) = program.stx.body[0].stx.as_ref() else {
      panic!("expected function declaration");
    };
    assert_eq!(func.id.as_ref().unwrap().stx.name, "f");
    assert_eq!(func.params[0].stx.as_id(), Some("n"));
    let Stmt::Return(ret) = func.body.stx.body[0].stx.as_ref() else {
      panic!("expected return");
    };
    let arg = ret.argument.as_ref().unwrap();
    assert_eq!((arg.loc.start, arg.loc.end), (23, 28));
    let Expr::Binary(bin) = arg.stx.as_ref() else {
      panic!("expected binary expression");
    };
    assert_eq!(bin.operator, BinaryOp::Le);
    assert_eq!((bin.right.loc.start, bin.right.loc.end), (27, 28));
    let Expr::Lit(lit) = bin.right.stx.as_ref() else {
      panic!("expected literal");
    };
    assert_eq!(lit.value, LitValue::Num(2.0));
  }

  #[test]
  fn literal_values_and_regex() {
    let json = r#"{"type": "Program", "start": 0, "end": 0, "body": [
      {"type": "ExpressionStatement", "start": 0, "end": 0, "directive": "use strict",
       "expression": {"type": "Literal", "start": 0, "end": 0, "value": "use strict"}},
      {"type": "ExpressionStatement", "start": 0, "end": 0,
       "expression": {"type": "Literal", "start": 0, "end": 0, "value": null}},
      {"type": "ExpressionStatement", "start": 0, "end": 0,
       "expression": {"type": "Literal", "start": 0, "end": 0, "value": true}},
      {"type": "ExpressionStatement", "start": 0, "end": 0,
       "expression": {"type": "Literal", "start": 0, "end": 0, "value": {},
        "regex": {"pattern": "a+", "flags": "g"}}}
    ]}"#;
    let program = parse_program_json(json).unwrap();
    let values: Vec<_> = program
      .stx
      .body
      .iter()
      .map(|s| match s.stx.as_ref() {
        Stmt::Expr(e) => match e.expression.stx.as_ref() {
          Expr::Lit(l) => (l.value.clone(), l.regex.is_some()),
          other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
      })
      .collect();
    assert_eq!(values[0].0, LitValue::Str("use strict".into()));
    assert_eq!(values[1].0, LitValue::Null);
    assert_eq!(values[2].0, LitValue::Bool(true));
    assert!(values[3].1);
  }

  #[test]
  fn for_heads_distinguish_declarations() {
    let json = r#"{"type": "Program", "body": [
      {"type": "ForInStatement", "start": 0, "end": 20,
       "left": {"type": "VariableDeclaration", "kind": "var", "declarations": [
         {"type": "VariableDeclarator", "id": {"type": "Identifier", "name": "k"}, "init": null}]},
       "right": {"type": "Identifier", "name": "o"},
       "body": {"type": "EmptyStatement"}},
      {"type": "ForInStatement",
       "left": {"type": "Identifier", "name": "k"},
       "right": {"type": "Identifier", "name": "o"},
       "body": {"type": "EmptyStatement"}}
    ]}"#;
    let program = parse_program_json(json).unwrap();
    let heads: Vec<_> = program
      .stx
      .body
      .iter()
      .map(|s| match s.stx.as_ref() {
        Stmt::ForIn(f) => match &f.left {
          ForInit::Var(decl) => format!("var {:?}", decl.stx.kind),
          ForInit::Expr(e) => format!("expr {}", e.stx.as_id().unwrap()),
        },
        other => panic!("unexpected {:?}", other),
      })
      .collect();
    assert_eq!(heads, vec![format!("var {:?}", VarKind::Var), "expr k".to_string()]);
  }

  #[test]
  fn unknown_node_type_is_an_error() {
    let json = r#"{"type": "Program", "body": [{"type": "ImportDeclaration"}]}"#;
    assert!(parse_program_json(json).is_err());
  }
}
