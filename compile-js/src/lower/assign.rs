use super::expr::is_simple;
use super::Compiler;
use crate::hir::builder::FunctionBuilder;
use crate::hir::Imm;
use crate::hir::Inst;
use crate::hir::OpCode;
use crate::hir::RValue;
use estree_js::expr::AssignExpr;
use estree_js::expr::Expr;
use estree_js::expr::UpdateExpr;
use estree_js::node::Node;
use estree_js::operator::AssignOp;
use estree_js::operator::UpdateOp;

/// An evaluated assignment target.
#[derive(Debug)]
pub(super) enum LValue {
  Var(RValue),
  /// Writes are dropped; reads see the current value.
  ReadOnly(RValue),
  Member { obj: RValue, key: RValue },
  Invalid,
}

impl<'a> Compiler<'a> {
  /// Evaluates the object and key of a target once. With `stable`, they are
  /// pinned so that evaluating the right-hand side cannot change them.
  pub(super) fn lvalue(&mut self, target: &Node<Expr>, stable: bool) -> LValue {
    match target.stx.as_ref() {
      Expr::Id(id) => {
        let v = self.resolve(&id.name, &target.loc);
        match self.write_var(v, &target.loc) {
          Some(r) => LValue::Var(r),
          None => LValue::ReadOnly(self.read_var(v)),
        }
      }
      Expr::Member(m) => {
        if m.optional {
          self.error(&target.loc, "optional chain is not a valid assignment target");
        }
        let obj = self.compile_expr(&m.object, true, None);
        let obj = if stable || (m.computed && !is_simple(&m.property)) {
          self.pin(obj)
        } else {
          obj
        };
        let key = self.member_key(m);
        let key = if stable { self.pin(key) } else { key };
        LValue::Member { obj, key }
      }
      Expr::ObjectPat(_) | Expr::ArrayPat(_) => {
        self.not_supported(&target.loc, "destructuring assignment");
        LValue::Invalid
      }
      _ => {
        self.error(&target.loc, "invalid assignment target");
        self.discard(Some(target));
        LValue::Invalid
      }
    }
  }

  pub(super) fn lvalue_read(&mut self, lv: &LValue) -> RValue {
    match lv {
      LValue::Var(v) | LValue::ReadOnly(v) => v.clone(),
      LValue::Member { obj, key } => {
        let dest = self.fb().alloc_temp();
        self.fb().push(Inst::Get {
          dest: dest.clone(),
          obj: obj.clone(),
          key: key.clone(),
        });
        dest
      }
      LValue::Invalid => RValue::UNDEFINED,
    }
  }

  pub(super) fn lvalue_write(&mut self, lv: &LValue, value: RValue) {
    match lv {
      LValue::Var(dest) => self.fb().gen_assign(dest.clone(), value),
      LValue::Member { obj, key } => self.fb().push(Inst::Put {
        obj: obj.clone(),
        key: key.clone(),
        value,
      }),
      LValue::ReadOnly(_) | LValue::Invalid => {}
    }
  }

  pub(super) fn lvalue_release(&mut self, lv: LValue) {
    match lv {
      LValue::Member { obj, key } => {
        self.release(&obj);
        self.release(&key);
      }
      LValue::Var(v) | LValue::ReadOnly(v) => self.release(&v),
      LValue::Invalid => {}
    }
  }

  /// The value of an assignment expression once `value` has been stored.
  fn assigned_value(&mut self, lv: LValue, value: RValue, need: bool) -> RValue {
    let result = match (&lv, need) {
      (_, false) => {
        self.release(&value);
        RValue::UNDEFINED
      }
      (_, true) if value.is_imm() => value,
      (LValue::Var(v), true) => {
        self.release(&value);
        v.clone()
      }
      (_, true) => value,
    };
    self.lvalue_release(lv);
    result
  }

  pub(super) fn assign_expr(&mut self, a: &AssignExpr, e: &Node<Expr>, need: bool) -> RValue {
    match a.operator {
      AssignOp::Assign => {
        let lv = self.lvalue(&a.left, !is_simple(&a.right));
        let value = self.compile_expr(&a.right, true, None);
        self.lvalue_write(&lv, value.clone());
        self.assigned_value(lv, value, need)
      }
      AssignOp::And | AssignOp::Or | AssignOp::Nullish => self.logical_assign(a, need),
      op => {
        let bop = op.binary().expect("compound assignment operator");
        let lv = self.lvalue(&a.left, true);
        let cur = self.lvalue_read(&lv);
        let cur = if is_simple(&a.right) { cur } else { self.pin(cur) };
        let rhs = self.compile_expr(&a.right, true, None);
        let value = self.binary_op(bop, cur, rhs, e, None);
        self.lvalue_write(&lv, value.clone());
        self.assigned_value(lv, value, need)
      }
    }
  }

  /// `a &&= b`, `a ||= b` and `a ??= b` only store when the right-hand side
  /// is evaluated.
  fn logical_assign(&mut self, a: &AssignExpr, need: bool) -> RValue {
    let lv = self.lvalue(&a.left, true);
    let cur = self.lvalue_read(&lv);
    self.release(&cur);
    let dest = self.fb().alloc_temp();
    self.fb().gen_assign(dest.clone(), cur);
    let (rhs, end) = (self.fb().new_label(), self.fb().new_label());
    match a.operator {
      AssignOp::And => self.fb().gen_if_true(dest.clone(), rhs, end),
      AssignOp::Or => self.fb().gen_if_true(dest.clone(), end, rhs),
      _ => self.fb().gen_if(
        OpCode::LooseEq,
        dest.clone(),
        RValue::Imm(Imm::Null),
        rhs,
        end,
      ),
    };
    self.fb().place_label(rhs);
    let value = self.compile_expr(&a.right, true, None);
    self.lvalue_write(&lv, value.clone());
    self.fb().gen_assign(dest.clone(), value.clone());
    self.release(&value);
    self.fb().place_label(end);
    self.lvalue_release(lv);
    if need {
      dest
    } else {
      self.release(&dest);
      RValue::UNDEFINED
    }
  }

  /// `++`/`--`. The old value is converted to a number first; a postfix form
  /// keeps it in its own temporary as the result.
  pub(super) fn update(&mut self, u: &UpdateExpr, need: bool) -> RValue {
    let op = match u.operator {
      UpdateOp::Inc => OpCode::AddN,
      UpdateOp::Dec => OpCode::SubN,
    };
    let lv = self.lvalue(&u.argument, false);
    let old = self.lvalue_read(&lv);
    let n = self.to_number(old);
    let (value, result) = if !u.prefix && need {
      let value = match FunctionBuilder::fold_binop(op, &n, &RValue::num(1.0)) {
        Some(v) => v,
        None => {
          let t = self.fb().alloc_temp();
          self.fb().gen_binop(op, t.clone(), n.clone(), RValue::num(1.0));
          t
        }
      };
      (value, n)
    } else {
      let value = self.gen_binop(op, n, RValue::num(1.0));
      (value.clone(), value)
    };
    self.lvalue_write(&lv, value.clone());
    self.lvalue_release(lv);
    if !need {
      self.release(&value);
      return RValue::UNDEFINED;
    }
    if value != result {
      self.release(&value);
    }
    result
  }
}
