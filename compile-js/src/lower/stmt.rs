use super::expr::is_pure;
use super::native::parse_template;
use super::Compiler;
use super::JumpTarget;
use crate::hir::Imm;
use crate::hir::Inst;
use crate::hir::Jump;
use crate::hir::Label;
use crate::hir::OpCode;
use crate::hir::RValue;
use crate::hir::SysConst;
use ahash::HashSet;
use ahash::HashSetExt;
use estree_js::expr::Expr;
use estree_js::expr::Lit;
use estree_js::expr::LitValue;
use estree_js::node::Loc;
use estree_js::node::Node;
use estree_js::stmt::ForInStmt;
use estree_js::stmt::ForInit;
use estree_js::stmt::ForStmt;
use estree_js::stmt::JumpStmt;
use estree_js::stmt::Stmt;
use estree_js::stmt::SwitchStmt;
use estree_js::stmt::TryStmt;
use estree_js::stmt::VarDecl;

const FOR_IN_START: &str = "%[iter] = js_for_in_start(&frame, %[obj]);";
const FOR_IN_NEXT: &str = "%[more] = js_for_in_next(&frame, %[iter], &%[key]);";

/// The value of a `case` test usable in a jump table.
fn int32_case(test: &Node<Expr>) -> Option<i32> {
  match test.stx.as_ref() {
    Expr::Lit(Lit {
      value: LitValue::Num(n),
      ..
    }) if n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64 => {
      // -0 would be indistinguishable from 0.
      (!(*n == 0.0 && n.is_sign_negative())).then_some(*n as i32)
    }
    _ => None,
  }
}

impl<'a> Compiler<'a> {
  pub(super) fn compile_stmt(&mut self, stmt: &Node<Stmt>) {
    let labels = std::mem::take(&mut self.pending_labels);
    let loc = &stmt.loc;
    match stmt.stx.as_ref() {
      Stmt::While(s) => {
        let (head, body, exit) = self.three_labels();
        self.fb().place_label(head);
        self.cond(&s.test, body, exit);
        self.fb().place_label(body);
        self.loop_body(&s.body, labels, exit, head);
        self.fb().goto(head);
        self.fb().place_label(exit);
      }
      Stmt::DoWhile(s) => {
        let (body, next, exit) = self.three_labels();
        self.fb().place_label(body);
        self.loop_body(&s.body, labels, exit, next);
        self.fb().place_label(next);
        self.cond(&s.test, body, exit);
        self.fb().place_label(exit);
      }
      Stmt::For(s) => self.for_stmt(s, labels),
      Stmt::ForIn(s) => self.for_in(s, labels),
      Stmt::ForOf(s) => {
        self.discard(Some(&s.right));
        let (next, exit) = (self.fb().new_label(), self.fb().new_label());
        self.fb().place_label(next);
        self.loop_body(&s.body, labels, exit, next);
        self.fb().place_label(exit);
        self.not_supported(loc, "for-of loop");
      }
      Stmt::Switch(s) => self.switch_stmt(s, loc, labels),
      Stmt::Label(s) => {
        let name = s.label.stx.name.clone();
        let taken = labels.contains(&name)
          || self
            .ctx()
            .targets
            .iter()
            .any(|t| t.names.contains(&name));
        if taken {
          self.error(&s.label.loc, format!("duplicate label '{name}'"));
        }
        let mut labels = labels;
        labels.push(name);
        self.pending_labels = labels;
        self.compile_stmt(&s.body);
      }
      _ if !labels.is_empty() => {
        // A labeled non-loop statement can only be left with `break label`.
        let exit = self.fb().new_label();
        self.push_target(labels, exit, None, false);
        self.compile_simple_stmt(stmt);
        self.pop_target();
        self.fb().place_label(exit);
      }
      _ => self.compile_simple_stmt(stmt),
    }
  }

  fn compile_simple_stmt(&mut self, stmt: &Node<Stmt>) {
    let loc = &stmt.loc;
    match stmt.stx.as_ref() {
      Stmt::Block(b) => {
        for s in b.body.iter() {
          self.compile_stmt(s);
        }
      }
      Stmt::Empty(_) | Stmt::FuncDecl(_) => {}
      Stmt::Expr(s) => {
        if s.directive.is_some() {
          return;
        }
        if is_pure(&s.expression) {
          self.warning(loc, "expression result is unused");
        }
        self.discard(Some(&s.expression));
      }
      Stmt::If(s) => {
        let (then_l, else_l, end) = self.three_labels();
        self.cond(&s.test, then_l, else_l);
        self.fb().place_label(then_l);
        self.compile_stmt(&s.consequent);
        match &s.alternate {
          Some(alt) => {
            self.fb().goto(end);
            self.fb().place_label(else_l);
            self.compile_stmt(alt);
            self.fb().place_label(end);
          }
          None => self.fb().place_label(else_l),
        }
      }
      Stmt::Break(j) => self.jump_stmt(j, loc, false),
      Stmt::Continue(j) => self.jump_stmt(j, loc, true),
      Stmt::With(s) => {
        self.discard(Some(&s.object));
        self.compile_stmt(&s.body);
        self.not_supported(loc, "with statement");
      }
      Stmt::Return(s) => {
        let value = match &s.argument {
          Some(e) => self.compile_expr(e, true, None),
          None => RValue::UNDEFINED,
        };
        if self.ctxs.len() == 1 {
          self.error(loc, "return outside of a function");
          self.release(&value);
          return;
        }
        self.end_tries(0);
        self.fb().gen_ret(value.clone());
        self.release(&value);
      }
      Stmt::Throw(s) => {
        let value = self.compile_expr(&s.argument, true, None);
        self.fb().set_jump(Jump::Throw(value.clone()));
        self.release(&value);
      }
      Stmt::Try(s) => self.try_stmt(s, loc),
      Stmt::Debugger(_) => self.warning(loc, "debugger statement is ignored"),
      Stmt::VarDecl(d) => self.var_decl(d),
      Stmt::ClassDecl(c) => {
        self.discard(c.super_class.as_ref());
        self.not_supported(loc, "class declaration");
      }
      Stmt::While(_)
      | Stmt::DoWhile(_)
      | Stmt::For(_)
      | Stmt::ForIn(_)
      | Stmt::ForOf(_)
      | Stmt::Switch(_)
      | Stmt::Label(_) => unreachable!("handled by compile_stmt"),
    }
  }

  fn three_labels(&mut self) -> (Label, Label, Label) {
    let fb = self.fb();
    (fb.new_label(), fb.new_label(), fb.new_label())
  }

  fn push_target(&mut self, names: Vec<String>, break_label: Label, continue_label: Option<Label>, breakable: bool) {
    let try_depth = self.ctx().tries.len();
    self.ctx_mut().targets.push(JumpTarget {
      names,
      break_label,
      continue_label,
      breakable,
      try_depth,
    });
  }

  fn pop_target(&mut self) {
    self.ctx_mut().targets.pop();
  }

  fn loop_body(&mut self, body: &Node<Stmt>, labels: Vec<String>, exit: Label, next: Label) {
    self.push_target(labels, exit, Some(next), true);
    self.compile_stmt(body);
    self.pop_target();
  }

  /// Leaves every `try` region entered after the first `depth`, innermost
  /// first.
  fn end_tries(&mut self, depth: usize) {
    let tries: Vec<u32> = self.ctx().tries[depth..].iter().rev().copied().collect();
    for index in tries {
      self.fb().push(Inst::EndTry { index });
    }
  }

  fn jump_stmt(&mut self, j: &JumpStmt, loc: &Loc, is_continue: bool) {
    let name = j.label.as_ref().map(|l| l.stx.name.as_str());
    let found = self.ctx().targets.iter().rev().find(|t| match name {
      Some(n) => t.names.iter().any(|x| x == n),
      None => t.breakable && (!is_continue || t.continue_label.is_some()),
    });
    let resolved = match (found, name) {
      (None, Some(n)) => Err(format!("undefined label '{n}'")),
      (None, None) if is_continue => Err("continue outside of a loop".to_string()),
      (None, None) => Err("break outside of a loop or switch".to_string()),
      (Some(t), _) if !is_continue => Ok((t.break_label, t.try_depth)),
      (Some(t), _) => match t.continue_label {
        Some(l) => Ok((l, t.try_depth)),
        None => Err(format!(
          "label '{}' does not name a loop",
          name.unwrap_or_default()
        )),
      },
    };
    match resolved {
      Ok((label, depth)) => {
        self.end_tries(depth);
        self.fb().goto(label);
      }
      Err(msg) => self.error(loc, msg),
    }
  }

  fn for_stmt(&mut self, s: &ForStmt, labels: Vec<String>) {
    match &s.init {
      Some(ForInit::Var(d)) => self.var_decl(&d.stx),
      Some(ForInit::Expr(e)) => self.discard(Some(e)),
      None => {}
    }
    let (head, body, exit) = self.three_labels();
    let next = self.fb().new_label();
    self.fb().place_label(head);
    if let Some(test) = &s.test {
      self.cond(test, body, exit);
    }
    self.fb().place_label(body);
    self.loop_body(&s.body, labels, exit, next);
    self.fb().place_label(next);
    self.discard(s.update.as_ref());
    self.fb().goto(head);
    self.fb().place_label(exit);
  }

  /// Visits the enumerable keys of the right-hand side. `null` and
  /// `undefined` skip the loop.
  fn for_in(&mut self, s: &ForInStmt, labels: Vec<String>) {
    let (body, next, exit) = self.three_labels();
    let enumerate = self.fb().new_label();
    let value = self.compile_expr(&s.right, true, None);
    self.fb().gen_if(
      OpCode::LooseEq,
      value.clone(),
      RValue::Imm(Imm::Null),
      exit,
      enumerate,
    );
    self.fb().place_label(enumerate);
    let obj = self.gen_unop(OpCode::ToObject, value);
    let iter = self.fb().alloc_temp();
    self.splice(FOR_IN_START, &["iter", "obj"], vec![iter.clone(), obj.clone()], 1);
    self.release(&obj);

    self.fb().place_label(next);
    let more = self.fb().alloc_temp();
    let key = self.fb().alloc_temp();
    self.splice(
      FOR_IN_NEXT,
      &["more", "key", "iter"],
      vec![more.clone(), key.clone(), iter.clone()],
      2,
    );
    self.fb().gen_if_true(more.clone(), body, exit);
    self.release(&more);
    self.fb().place_label(body);
    match &s.left {
      ForInit::Var(d) => match d.stx.declarations.as_slice() {
        [decl] => match decl.stx.id.stx.as_id() {
          Some(name) => {
            if decl.stx.init.is_some() {
              self.error(&decl.loc, "for-in variable cannot have an initializer");
            }
            let v = self.declared_target(name, &decl.loc);
            if let Some(dest) = self.write_var(v, &decl.loc) {
              self.fb().gen_assign(dest, key.clone());
            }
          }
          None => self.not_supported(&decl.loc, "destructuring declaration"),
        },
        _ => self.error(&d.loc, "for-in requires exactly one variable"),
      },
      ForInit::Expr(target) => {
        let lv = self.lvalue(target, false);
        self.lvalue_write(&lv, key.clone());
        self.lvalue_release(lv);
      }
    }
    self.release(&key);
    self.loop_body(&s.body, labels, exit, next);
    self.fb().goto(next);
    self.fb().place_label(exit);
    self.release(&iter);
  }

  /// Emits a compiler-generated native splice.
  fn splice(&mut self, template: &str, names: &[&str], bindings: Vec<RValue>, result_count: usize) {
    let (parts, _) = parse_template(template, names).expect("valid built-in template");
    self.fb().push(Inst::Asm {
      bindings,
      result_count,
      parts,
    });
  }

  fn switch_stmt(&mut self, s: &SwitchStmt, loc: &Loc, labels: Vec<String>) {
    let disc = self.compile_expr(&s.discriminant, true, None);
    if s.cases.is_empty() {
      self.warning(loc, "empty switch statement");
      self.release(&disc);
      return;
    }
    let disc = self.pin(disc);
    let exit = self.fb().new_label();
    let case_labels: Vec<Label> = s.cases.iter().map(|_| self.fb().new_label()).collect();
    let default = s
      .cases
      .iter()
      .position(|c| c.stx.test.is_none())
      .map_or(exit, |i| case_labels[i]);

    let table: Option<Vec<(i32, Label)>> = s
      .cases
      .iter()
      .zip(case_labels.iter())
      .filter_map(|(c, l)| c.stx.test.as_ref().map(|t| (t, *l)))
      .map(|(t, l)| int32_case(t).map(|v| (v, l)))
      .collect();
    let table = table.filter(|t| {
      let mut seen = HashSet::new();
      !disc.is_imm() && t.iter().all(|(v, _)| seen.insert(*v))
    });
    match table {
      Some(cases) => {
        self.fb().set_jump(Jump::Switch {
          value: disc.clone(),
          cases,
          default,
        });
      }
      None => {
        for (case, label) in s.cases.iter().zip(case_labels.iter()) {
          let Some(test) = &case.stx.test else {
            continue;
          };
          let v = self.compile_expr(test, true, None);
          let next = self.fb().new_label();
          self
            .fb()
            .gen_if(OpCode::StrictEq, disc.clone(), v.clone(), *label, next);
          self.release(&v);
          self.fb().place_label(next);
        }
        self.fb().goto(default);
      }
    }
    self.release(&disc);

    self.push_target(labels, exit, None, true);
    for (case, label) in s.cases.iter().zip(case_labels) {
      self.fb().place_label(label);
      for st in case.stx.consequent.iter() {
        self.compile_stmt(st);
      }
    }
    self.pop_target();
    self.fb().place_label(exit);
  }

  fn try_stmt(&mut self, s: &TryStmt, loc: &Loc) {
    let index = self.fb().new_try_index();
    let (body, catch, end) = self.three_labels();
    self.fb().set_jump(Jump::BeginTry {
      index,
      on_catch: catch,
      on_body: body,
    });
    self.fb().place_label(body);
    self.ctx_mut().tries.push(index);
    for st in s.block.stx.body.iter() {
      self.compile_stmt(st);
    }
    self.ctx_mut().tries.pop();
    self.fb().push(Inst::EndTry { index });
    self.fb().goto(end);

    self.fb().place_label(catch);
    match &s.handler {
      Some(h) => {
        let outer = self.ctx().scope;
        let func = self.ctx().func;
        let scope = self.scopes.new_scope(Some(outer), func, false);
        self.ctx_mut().scope = scope;
        match &h.stx.param {
          Some(param) => match param.stx.as_id() {
            Some(name) => {
              let v = self.new_variable(scope, name, false, None);
              let var = self.scopes.var_mut(v);
              var.declared = true;
              var.initialized = true;
              if let Some(dest) = self.write_var(v, &param.loc) {
                self.fb().push(Inst::LoadSc {
                  dest,
                  sc: SysConst::Thrown,
                });
              }
            }
            None => self.not_supported(&param.loc, "destructuring catch parameter"),
          },
          None => {}
        }
        for st in h.stx.body.stx.body.iter() {
          self.compile_stmt(st);
        }
        self.ctx_mut().scope = outer;
      }
      None => {
        let t = self.fb().alloc_temp();
        self.fb().push(Inst::LoadSc {
          dest: t.clone(),
          sc: SysConst::Thrown,
        });
        self.fb().set_jump(Jump::Throw(t.clone()));
        self.release(&t);
      }
    }
    self.fb().place_label(end);

    if let Some(f) = &s.finalizer {
      for st in f.stx.body.iter() {
        self.compile_stmt(st);
      }
      self.not_supported(loc, "finally");
    }
  }

  fn var_decl(&mut self, d: &VarDecl) {
    for decl in d.declarations.iter() {
      let Some(name) = decl.stx.id.stx.as_id() else {
        self.not_supported(&decl.loc, "destructuring declaration");
        self.discard(decl.stx.init.as_ref());
        continue;
      };
      let Some(init) = &decl.stx.init else {
        continue;
      };
      let v = self.declared_target(name, &decl.loc);
      match self.write_var(v, &decl.loc) {
        Some(dest) => {
          let value = self.compile_expr(init, true, None);
          self.fb().gen_assign(dest, value.clone());
          self.release(&value);
        }
        None => self.discard(Some(init)),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::super::tests::lower;
  use super::super::tests::messages;
  use crate::hir::FuncId;
  use crate::hir::Inst;
  use crate::hir::Jump;
  use crate::hir::SysConst;
  use estree_js::build::*;
  use estree_js::operator::BinaryOp;
  use estree_js::operator::UpdateOp;
  use estree_js::stmt::ForInit;

  fn jumps(m: &crate::hir::builder::ModuleBuilder, f: u32) -> Vec<Jump> {
    m.func(FuncId(f))
      .blocks
      .iter()
      .filter_map(|b| b.jump.clone())
      .collect()
  }

  fn insts(m: &crate::hir::builder::ModuleBuilder, f: u32) -> Vec<Inst> {
    m.func(FuncId(f))
      .blocks
      .iter()
      .flat_map(|b| b.body.iter().cloned())
      .collect()
  }

  #[test]
  fn integer_cases_use_a_jump_table() {
    // var x, y; switch (x) { case 1: y = 1; break; case 2: default: y = 2; }
    let p = program(vec![
      var(vec![("x", None), ("y", None)]),
      switch(id("x"), vec![
        (Some(num(1.0)), vec![expr_stmt(assign(id("y"), num(1.0))), brk(None)]),
        (Some(num(2.0)), vec![]),
        (None, vec![expr_stmt(assign(id("y"), num(2.0)))]),
      ]),
    ]);
    let (m, r) = lower(&p, true);
    assert_eq!(r.error_count(), 0, "{:?}", messages(&r));
    let switch = jumps(&m, 0)
      .into_iter()
      .find_map(|j| match j {
        Jump::Switch { cases, .. } => Some(cases),
        _ => None,
      })
      .expect("jump table");
    assert_eq!(switch.iter().map(|(v, _)| *v).collect::<Vec<_>>(), vec![1, 2]);
  }

  #[test]
  fn other_cases_use_strict_equality() {
    let p = program(vec![
      var(vec![("x", None)]),
      switch(id("x"), vec![
        (Some(str("a")), vec![brk(None)]),
        (Some(num(1.5)), vec![]),
      ]),
    ]);
    let (m, _) = lower(&p, true);
    let ifs = jumps(&m, 0)
      .into_iter()
      .filter(|j| matches!(j, Jump::If { .. }))
      .count();
    assert_eq!(ifs, 2);
    assert!(jumps(&m, 0).iter().all(|j| !matches!(j, Jump::Switch { .. })));
  }

  #[test]
  fn empty_switch_warns() {
    let p = program(vec![var(vec![("x", None)]), switch(id("x"), vec![])]);
    let (_, r) = lower(&p, true);
    assert_eq!(messages(&r), vec!["warning: empty switch statement"]);
  }

  #[test]
  fn labeled_continue_and_stray_break() {
    // var i; outer: while (i) { while (i) { continue outer; } }
    let p = program(vec![
      var(vec![("i", None)]),
      labeled(
        "outer",
        while_(id("i"), while_(id("i"), cont(Some("outer")))),
      ),
    ]);
    let (_, r) = lower(&p, true);
    assert_eq!(r.error_count(), 0, "{:?}", messages(&r));

    let p = program(vec![brk(None), cont(Some("nowhere"))]);
    let (_, r) = lower(&p, true);
    assert_eq!(messages(&r), vec![
      "error: break outside of a loop or switch",
      "error: undefined label 'nowhere'",
    ]);
  }

  #[test]
  fn labeled_block_accepts_break() {
    let p = program(vec![labeled("done", block(vec![brk(Some("done"))]))]);
    let (_, r) = lower(&p, true);
    assert_eq!(r.error_count(), 0, "{:?}", messages(&r));
  }

  #[test]
  fn return_inside_try_ends_region() {
    // function f() { try { return 1; } catch (e) { return e; } }
    let p = program(vec![func_decl("f", &[], vec![try_catch(
      vec![ret(Some(num(1.0)))],
      Some("e"),
      vec![ret(Some(id("e")))],
    )])]);
    let (m, r) = lower(&p, true);
    assert_eq!(r.error_count(), 0, "{:?}", messages(&r));
    assert!(jumps(&m, 1)
      .iter()
      .any(|j| matches!(j, Jump::BeginTry { index: 0, .. })));
    let body = insts(&m, 1);
    assert!(body.iter().any(|i| matches!(i, Inst::EndTry { index: 0 })));
    assert!(body.iter().any(|i| matches!(i, Inst::LoadSc {
      sc: SysConst::Thrown,
      ..
    })));
  }

  #[test]
  fn do_while_continue_reaches_the_test() {
    // var i; do { continue; } while ((i, i));
    let p = program(vec![
      var(vec![("i", None)]),
      do_while(block(vec![cont(None)]), seq(vec![id("i"), id("i")])),
    ]);
    let (m, r) = lower(&p, true);
    assert_eq!(r.error_count(), 0, "{:?}", messages(&r));
    assert!(jumps(&m, 0)
      .iter()
      .any(|j| matches!(j, Jump::IfTrue { .. })));
  }

  #[test]
  fn top_level_return_is_an_error() {
    let p = program(vec![ret(None)]);
    let (_, r) = lower(&p, false);
    assert_eq!(r.error_count(), 1);
  }

  #[test]
  fn for_in_enumerates_through_splices() {
    // var o, k; for (k in o) ;
    let p = program(vec![
      var(vec![("o", None), ("k", None)]),
      for_in(ForInit::Expr(id("k")), id("o"), empty()),
    ]);
    let (m, r) = lower(&p, true);
    assert_eq!(r.error_count(), 0, "{:?}", messages(&r));
    let body = insts(&m, 0);
    let splices: Vec<usize> = body
      .iter()
      .filter_map(|i| match i {
        Inst::Asm { result_count, .. } => Some(*result_count),
        _ => None,
      })
      .collect();
    assert_eq!(splices, vec![1, 2]);
    assert!(body.iter().any(|i| matches!(i, Inst::Unop {
      op: crate::hir::OpCode::ToObject,
      ..
    })));
  }

  #[test]
  fn for_loop_with_update() {
    // for (var i = 0; i < 10; i++) ;
    let p = program(vec![for_(
      Some(ForInit::Var(var_decl(estree_js::operator::VarKind::Var, vec![("i", Some(num(0.0)))]))),
      Some(bin(BinaryOp::Lt, id("i"), num(10.0))),
      Some(update(UpdateOp::Inc, false, id("i"))),
      empty(),
    )]);
    let (m, r) = lower(&p, true);
    assert_eq!(r.error_count(), 0, "{:?}", messages(&r));
    assert!(jumps(&m, 0)
      .iter()
      .any(|j| matches!(j, Jump::If { op: crate::hir::OpCode::IfLt, .. })));
  }

  #[test]
  fn unused_pure_expression_warns() {
    let p = program(vec![directive("use strict"), expr_stmt(num(1.0))]);
    let (_, r) = lower(&p, false);
    assert_eq!(messages(&r), vec!["warning: expression result is unused"]);
  }
}
