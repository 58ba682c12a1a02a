use super::mentions;
use super::Branch;
use super::Compiler;
use crate::hir::builder::FunctionBuilder;
use crate::hir::fold::num_to_string;
use crate::hir::Callee;
use crate::hir::CreateKind;
use crate::hir::Imm;
use crate::hir::Inst;
use crate::hir::OpCode;
use crate::hir::RValue;
use estree_js::expr::ArrayExpr;
use estree_js::expr::BinaryExpr;
use estree_js::expr::CallExpr;
use estree_js::expr::CondExpr;
use estree_js::expr::Expr;
use estree_js::expr::Lit;
use estree_js::expr::LitValue;
use estree_js::expr::LogicalExpr;
use estree_js::expr::MemberExpr;
use estree_js::expr::NewExpr;
use estree_js::expr::ObjectExpr;
use estree_js::expr::ObjectMember;
use estree_js::expr::UnaryExpr;
use estree_js::func::Func;
use estree_js::node::Loc;
use estree_js::node::Node;
use estree_js::operator::BinaryOp;
use estree_js::operator::LogicalOp;
use estree_js::operator::PropKind;
use estree_js::operator::UnaryOp;

/// Evaluating the expression cannot change any variable.
pub(super) fn is_simple(e: &Node<Expr>) -> bool {
  matches!(
    e.stx.as_ref(),
    Expr::Id(_) | Expr::Lit(_) | Expr::This(_) | Expr::Func(_)
  )
}

/// Has no effect when its value is discarded.
pub(super) fn is_pure(e: &Node<Expr>) -> bool {
  match e.stx.as_ref() {
    Expr::Id(_) | Expr::Lit(_) | Expr::This(_) | Expr::Func(_) => true,
    Expr::Seq(s) => s.expressions.iter().all(is_pure),
    _ => false,
  }
}

impl<'a> Compiler<'a> {
  /// Lowers an expression. With a branch, control jumps to one of its labels
  /// and the returned value is meaningless; otherwise the result is returned,
  /// and is only meaningful when `need` is set.
  pub(super) fn compile_expr(&mut self, e: &Node<Expr>, need: bool, branch: Option<Branch>) -> RValue {
    let loc = &e.loc;
    let value = match e.stx.as_ref() {
      Expr::Id(id) => {
        let v = self.resolve(&id.name, loc);
        self.read_var(v)
      }
      Expr::Lit(lit) => self.literal(lit, loc),
      Expr::This(_) => self.fb().this_param(),
      Expr::Array(a) => self.array_literal(a),
      Expr::Object(o) => self.object_literal(o),
      Expr::Func(f) => self.function_expr(f, loc),
      Expr::Unary(u) => return self.unary(u, e, need, branch),
      Expr::Update(u) => self.update(u, need),
      Expr::Binary(b) => return self.binary_expr(b, e, branch),
      Expr::Logical(l) => return self.logical(l, e, need, branch),
      Expr::Assign(a) => self.assign_expr(a, e, need),
      Expr::Cond(c) => return self.conditional(c, need, branch),
      Expr::Call(c) => self.call_expr(c, loc, need),
      Expr::New(n) => self.new_expr(n, need),
      Expr::Member(m) => self.member_get(m, loc),
      Expr::Seq(s) => {
        let (last, init) = s
          .expressions
          .split_last()
          .expect("empty sequence expression");
        for x in init {
          let v = self.compile_expr(x, false, None);
          self.release(&v);
        }
        return self.compile_expr(last, need, branch);
      }
      Expr::Arrow(_) => {
        self.not_supported(loc, "arrow function");
        RValue::UNDEFINED
      }
      Expr::Class(c) => {
        self.discard(c.super_class.as_ref());
        self.not_supported(loc, "class");
        RValue::UNDEFINED
      }
      Expr::Template(t) => {
        for x in t.expressions.iter() {
          self.discard(Some(x));
        }
        self.not_supported(loc, "template literal");
        RValue::UNDEFINED
      }
      Expr::TaggedTemplate(t) => {
        self.discard(Some(&t.tag));
        for x in t.quasi.stx.expressions.iter() {
          self.discard(Some(x));
        }
        self.not_supported(loc, "tagged template");
        RValue::UNDEFINED
      }
      Expr::Spread(s) => {
        self.discard(Some(&s.argument));
        self.not_supported(loc, "spread element");
        RValue::UNDEFINED
      }
      Expr::Yield(y) => {
        self.discard(y.argument.as_ref());
        self.not_supported(loc, "yield");
        RValue::UNDEFINED
      }
      Expr::Await(a) => {
        self.discard(Some(&a.argument));
        self.not_supported(loc, "await");
        RValue::UNDEFINED
      }
      Expr::ObjectPat(_) | Expr::ArrayPat(_) => {
        self.not_supported(loc, "destructuring pattern");
        RValue::UNDEFINED
      }
    };
    match branch {
      Some(br) => {
        self.branch_on(e, value, br);
        RValue::UNDEFINED
      }
      None => value,
    }
  }

  /// Lowers an expression for its side effects only.
  pub(super) fn discard(&mut self, e: Option<&Node<Expr>>) {
    if let Some(e) = e {
      let v = self.compile_expr(e, false, None);
      self.release(&v);
    }
  }

  /// Lowers a condition into a jump to `on_true` or `on_false`.
  pub(super) fn cond(&mut self, e: &Node<Expr>, on_true: crate::hir::Label, on_false: crate::hir::Label) {
    self.compile_expr(e, true, Some(Branch::new(on_true, on_false)));
  }

  fn branch_on(&mut self, e: &Node<Expr>, value: RValue, br: Branch) {
    let taken = self.fb().gen_if_true(value.clone(), br.on_true, br.on_false);
    self.release(&value);
    if let Some(taken) = taken {
      self.warn_constant(e, taken);
    }
  }

  /// Literal conditions such as `while (1)` are taken to be intentional.
  fn warn_constant(&mut self, e: &Node<Expr>, taken: bool) {
    if !matches!(e.stx.as_ref(), Expr::Lit(_)) {
      self.warning(&e.loc, format!("condition is always {taken}"));
    }
  }

  /// Copies a variable operand into a temporary, so that evaluating later
  /// operands cannot change it.
  pub(super) fn pin(&mut self, v: RValue) -> RValue {
    match v {
      RValue::Var(_) => {
        let t = self.fb().alloc_temp();
        self.fb().gen_assign(t.clone(), v);
        t
      }
      v => v,
    }
  }

  /// A destination for a result computed from `operands`, reusing one of
  /// their temporaries. The other operand temporaries are released.
  pub(super) fn result_temp(&mut self, operands: &[&RValue]) -> RValue {
    let fb = self.fb();
    let dest = match operands.iter().find(|v| fb.is_temp(v)) {
      Some(v) => (*v).clone(),
      None => fb.alloc_temp(),
    };
    for v in operands {
      if **v != dest {
        fb.release(v);
      }
    }
    dest
  }

  pub(super) fn gen_unop(&mut self, op: OpCode, a: RValue) -> RValue {
    if let Some(v) = FunctionBuilder::fold_unop(op, &a) {
      return v;
    }
    let dest = self.result_temp(&[&a]);
    self.fb().gen_unop(op, dest.clone(), a);
    dest
  }

  pub(super) fn to_number(&mut self, a: RValue) -> RValue {
    self.gen_unop(OpCode::ToNumber, a)
  }

  pub(super) fn gen_binop(&mut self, op: OpCode, a: RValue, b: RValue) -> RValue {
    if let Some(v) = FunctionBuilder::fold_binop(op, &a, &b) {
      self.release(&a);
      self.release(&b);
      return v;
    }
    let dest = self.result_temp(&[&a, &b]);
    self.fb().gen_binop(op, dest.clone(), a, b);
    dest
  }

  fn literal(&mut self, lit: &Lit, loc: &Loc) -> RValue {
    if lit.regex.is_some() {
      self.not_supported(loc, "regular expression literal");
      return RValue::UNDEFINED;
    }
    if lit.bigint.is_some() {
      self.not_supported(loc, "bigint literal");
      return RValue::UNDEFINED;
    }
    match &lit.value {
      LitValue::Null => RValue::Imm(Imm::Null),
      LitValue::Bool(b) => RValue::Imm(Imm::Bool(*b)),
      LitValue::Num(n) => RValue::num(*n),
      LitValue::Str(s) => RValue::str(s.as_str()),
      LitValue::Other(_) => {
        self.not_supported(loc, "literal");
        RValue::UNDEFINED
      }
    }
  }

  fn array_literal(&mut self, a: &ArrayExpr) -> RValue {
    let dest = self.fb().alloc_temp();
    self.fb().push(Inst::Create {
      dest: dest.clone(),
      kind: CreateKind::Array {
        len: a.elements.len() as u32,
      },
    });
    for (i, el) in a.elements.iter().enumerate() {
      let Some(el) = el else {
        continue;
      };
      if let Expr::Spread(s) = el.stx.as_ref() {
        self.discard(Some(&s.argument));
        self.not_supported(&el.loc, "spread element");
        continue;
      }
      let value = self.compile_expr(el, true, None);
      self.fb().push(Inst::Put {
        obj: dest.clone(),
        key: RValue::num(i as f64),
        value: value.clone(),
      });
      self.release(&value);
    }
    dest
  }

  fn object_literal(&mut self, o: &ObjectExpr) -> RValue {
    let dest = self.fb().alloc_temp();
    self.fb().push(Inst::Create {
      dest: dest.clone(),
      kind: CreateKind::Object,
    });
    for member in o.properties.iter() {
      let p = match member.stx.as_ref() {
        ObjectMember::Property(p) => p,
        ObjectMember::Spread(s) => {
          self.discard(Some(&s.argument));
          self.not_supported(&member.loc, "object spread");
          continue;
        }
      };
      if p.kind != PropKind::Init {
        self.not_supported(&member.loc, "accessor property");
        continue;
      }
      let key = if p.computed {
        self.compile_expr(&p.key, true, None)
      } else {
        match p.key.stx.as_ref() {
          Expr::Id(id) => RValue::str(id.name.as_str()),
          Expr::Lit(Lit {
            value: LitValue::Str(s),
            ..
          }) => RValue::str(s.as_str()),
          Expr::Lit(Lit {
            value: LitValue::Num(n),
            ..
          }) => RValue::str(num_to_string(*n)),
          _ => {
            self.error(&p.key.loc, "invalid property key");
            continue;
          }
        }
      };
      let value = self.compile_expr(&p.value, true, None);
      self.fb().push(Inst::Put {
        obj: dest.clone(),
        key: key.clone(),
        value: value.clone(),
      });
      self.release(&key);
      self.release(&value);
    }
    dest
  }

  /// A named function expression binds its own name, read-only, visible
  /// only inside the function. The binding needs storage of its own for each
  /// evaluation, so it lives in a wrapper called right here.
  fn function_expr(&mut self, f: &Func, loc: &Loc) -> RValue {
    let name = f.id.as_ref().map(|id| id.stx.name.as_str());
    let Some(name) = name.filter(|n| mentions(f, n)) else {
      let cur = self.ctx().scope;
      let func = self.compile_function(f, name, loc, cur);
      let dest = self.fb().alloc_temp();
      self.fb().push(Inst::Closure {
        dest: dest.clone(),
        func,
      });
      return dest;
    };
    let wrapper = self.compile_name_binding(f, name, loc);
    let closure = self.fb().alloc_temp();
    self.fb().push(Inst::Closure {
      dest: closure.clone(),
      func: wrapper,
    });
    let callee = Callee::Direct {
      func: wrapper,
      closure: closure.clone(),
    };
    self.emit_call(callee, closure, RValue::UNDEFINED, Vec::new(), true)
  }

  fn unary(&mut self, u: &UnaryExpr, e: &Node<Expr>, need: bool, branch: Option<Branch>) -> RValue {
    let value = match u.operator {
      UnaryOp::Not => {
        if let Some(br) = branch {
          return self.compile_expr(&u.argument, true, Some(br.inverted()));
        }
        let a = self.compile_expr(&u.argument, true, None);
        self.gen_unop(OpCode::LogNot, a)
      }
      UnaryOp::Neg => {
        let a = self.compile_expr(&u.argument, true, None);
        let n = self.to_number(a);
        self.gen_unop(OpCode::NegN, n)
      }
      UnaryOp::Plus => {
        let a = self.compile_expr(&u.argument, true, None);
        self.to_number(a)
      }
      UnaryOp::BitNot => {
        let a = self.compile_expr(&u.argument, true, None);
        let n = self.to_number(a);
        self.gen_unop(OpCode::BinNotN, n)
      }
      UnaryOp::Typeof => {
        let a = self.compile_expr(&u.argument, true, None);
        self.gen_unop(OpCode::Typeof, a)
      }
      UnaryOp::Void => {
        self.discard(Some(&u.argument));
        RValue::UNDEFINED
      }
      UnaryOp::Delete => self.delete(&u.argument),
    };
    match branch {
      Some(br) => {
        self.branch_on(e, value, br);
        RValue::UNDEFINED
      }
      None if need => value,
      None => {
        self.release(&value);
        RValue::UNDEFINED
      }
    }
  }

  fn delete(&mut self, target: &Node<Expr>) -> RValue {
    match target.stx.as_ref() {
      Expr::Member(m) => {
        let obj = self.compile_expr(&m.object, true, None);
        let obj = if m.computed && !is_simple(&m.property) {
          self.pin(obj)
        } else {
          obj
        };
        let key = self.member_key(m);
        let dest = self.result_temp(&[&obj, &key]);
        self.fb().push(Inst::Binop {
          op: OpCode::Delete,
          dest: dest.clone(),
          a: obj,
          b: key,
        });
        dest
      }
      Expr::Id(id) => {
        self.strict_error(
          &target.loc,
          format!("cannot delete unqualified identifier '{}'", id.name),
        );
        RValue::Imm(Imm::Bool(false))
      }
      _ => {
        self.discard(Some(target));
        RValue::Imm(Imm::Bool(true))
      }
    }
  }

  fn binary_expr(&mut self, b: &BinaryExpr, e: &Node<Expr>, branch: Option<Branch>) -> RValue {
    let a = self.compile_expr(&b.left, true, None);
    let a = if is_simple(&b.right) { a } else { self.pin(a) };
    let bv = self.compile_expr(&b.right, true, None);
    self.binary_op(b.operator, a, bv, e, branch)
  }

  /// Applies a source binary operator to evaluated operands.
  pub(super) fn binary_op(
    &mut self,
    op: BinaryOp,
    a: RValue,
    b: RValue,
    e: &Node<Expr>,
    branch: Option<Branch>,
  ) -> RValue {
    let (op, a, b) = match op {
      BinaryOp::LooseEq | BinaryOp::LooseNe => {
        self.warning(&e.loc, format!("loose equality '{}'", op.as_str()));
        let op = if op == BinaryOp::LooseEq {
          OpCode::LooseEq
        } else {
          OpCode::LooseNe
        };
        (op, a, b)
      }
      BinaryOp::StrictEq => (OpCode::StrictEq, a, b),
      BinaryOp::StrictNe => (OpCode::StrictNe, a, b),
      BinaryOp::Lt => (OpCode::Lt, a, b),
      BinaryOp::Le => (OpCode::Le, a, b),
      BinaryOp::Gt => (OpCode::Lt, b, a),
      BinaryOp::Ge => (OpCode::Le, b, a),
      BinaryOp::Add => (OpCode::Add, a, b),
      BinaryOp::In => (OpCode::In, a, b),
      BinaryOp::Instanceof => (OpCode::Instanceof, a, b),
      BinaryOp::Exp => {
        self.release(&a);
        self.release(&b);
        self.not_supported(&e.loc, "exponentiation operator");
        return match branch {
          Some(br) => {
            self.branch_on(e, RValue::UNDEFINED, br);
            RValue::UNDEFINED
          }
          None => RValue::UNDEFINED,
        };
      }
      numeric => {
        #[rustfmt::skip]
        let op = match numeric {
          BinaryOp::Sub => OpCode::SubN,
          BinaryOp::Mul => OpCode::MulN,
          BinaryOp::Div => OpCode::DivN,
          BinaryOp::Mod => OpCode::ModN,
          BinaryOp::BitOr => OpCode::OrN,
          BinaryOp::BitXor => OpCode::XorN,
          BinaryOp::BitAnd => OpCode::AndN,
          BinaryOp::Shl => OpCode::ShlN,
          BinaryOp::Sar => OpCode::AsrN,
          BinaryOp::Shr => OpCode::SrN,
          other => unreachable!("{other:?} handled above"),
        };
        let a = self.to_number(a);
        let b = self.to_number(b);
        (op, a, b)
      }
    };

    if let (Some(br), true) = (branch, op.has_cond()) {
      let taken = self
        .fb()
        .gen_if(op, a.clone(), b.clone(), br.on_true, br.on_false);
      self.release(&a);
      self.release(&b);
      if let Some(taken) = taken {
        self.warn_constant(e, taken);
      }
      return RValue::UNDEFINED;
    }
    let value = self.gen_binop(op, a, b);
    match branch {
      Some(br) => {
        self.branch_on(e, value, br);
        RValue::UNDEFINED
      }
      None => value,
    }
  }

  fn logical(&mut self, l: &LogicalExpr, e: &Node<Expr>, need: bool, branch: Option<Branch>) -> RValue {
    if let Some(br) = branch {
      let mid = self.fb().new_label();
      match l.operator {
        LogicalOp::And => self.cond(&l.left, mid, br.on_false),
        LogicalOp::Or => self.cond(&l.left, br.on_true, mid),
        LogicalOp::Nullish => {
          let v = self.logical_value(l);
          self.branch_on(e, v, br);
          return RValue::UNDEFINED;
        }
      }
      self.fb().place_label(mid);
      self.cond(&l.right, br.on_true, br.on_false);
      return RValue::UNDEFINED;
    }
    if !need {
      let (rhs, end) = (self.fb().new_label(), self.fb().new_label());
      match l.operator {
        LogicalOp::And => self.cond(&l.left, rhs, end),
        LogicalOp::Or => self.cond(&l.left, end, rhs),
        LogicalOp::Nullish => {
          let a = self.compile_expr(&l.left, true, None);
          self
            .fb()
            .gen_if(OpCode::LooseEq, a.clone(), RValue::Imm(Imm::Null), rhs, end);
          self.release(&a);
        }
      }
      self.fb().place_label(rhs);
      self.discard(Some(&l.right));
      self.fb().place_label(end);
      return RValue::UNDEFINED;
    }
    self.logical_value(l)
  }

  /// Both operands are written to one destination.
  fn logical_value(&mut self, l: &LogicalExpr) -> RValue {
    let a = self.compile_expr(&l.left, true, None);
    self.release(&a);
    let dest = self.fb().alloc_temp();
    self.fb().gen_assign(dest.clone(), a);
    let (rhs, end) = (self.fb().new_label(), self.fb().new_label());
    match l.operator {
      LogicalOp::And => self.fb().gen_if_true(dest.clone(), rhs, end),
      LogicalOp::Or => self.fb().gen_if_true(dest.clone(), end, rhs),
      LogicalOp::Nullish => self
        .fb()
        .gen_if(OpCode::LooseEq, dest.clone(), RValue::Imm(Imm::Null), rhs, end),
    };
    self.fb().place_label(rhs);
    self.release(&dest);
    let b = self.compile_expr(&l.right, true, None);
    self.join_into(&dest, b);
    self.fb().place_label(end);
    dest
  }

  /// Writes the value of a second arm into the released destination of the
  /// first, taking the destination back.
  fn join_into(&mut self, dest: &RValue, v: RValue) {
    if v == *dest {
      return;
    }
    self.fb().alloc_specific(dest);
    self.fb().gen_assign(dest.clone(), v.clone());
    self.release(&v);
  }

  fn conditional(&mut self, c: &CondExpr, need: bool, branch: Option<Branch>) -> RValue {
    let (then_l, else_l, end) = (
      self.fb().new_label(),
      self.fb().new_label(),
      self.fb().new_label(),
    );
    self.cond(&c.test, then_l, else_l);
    if let Some(br) = branch {
      self.fb().place_label(then_l);
      self.cond(&c.consequent, br.on_true, br.on_false);
      self.fb().place_label(else_l);
      self.cond(&c.alternate, br.on_true, br.on_false);
      return RValue::UNDEFINED;
    }
    if !need {
      self.fb().place_label(then_l);
      self.discard(Some(&c.consequent));
      self.fb().goto(end);
      self.fb().place_label(else_l);
      self.discard(Some(&c.alternate));
      self.fb().place_label(end);
      return RValue::UNDEFINED;
    }
    self.fb().place_label(then_l);
    let x = self.compile_expr(&c.consequent, true, None);
    let dest = if self.fb().is_temp(&x) {
      x
    } else {
      let t = self.fb().alloc_temp();
      self.fb().gen_assign(t.clone(), x);
      t
    };
    self.fb().goto(end);
    self.release(&dest);
    self.fb().place_label(else_l);
    let y = self.compile_expr(&c.alternate, true, None);
    self.join_into(&dest, y);
    self.fb().place_label(end);
    dest
  }

  pub(super) fn member_key(&mut self, m: &MemberExpr) -> RValue {
    if m.computed {
      return self.compile_expr(&m.property, true, None);
    }
    match m.property.stx.as_id() {
      Some(name) => RValue::str(name),
      None => {
        self.error(&m.property.loc, "invalid member name");
        RValue::UNDEFINED
      }
    }
  }

  fn member_get(&mut self, m: &MemberExpr, loc: &Loc) -> RValue {
    if m.optional {
      self.not_supported(loc, "optional chaining");
    }
    let obj = self.compile_expr(&m.object, true, None);
    let obj = if m.computed && !is_simple(&m.property) {
      self.pin(obj)
    } else {
      obj
    };
    let key = self.member_key(m);
    let dest = self.result_temp(&[&obj, &key]);
    self.fb().push(Inst::Get {
      dest: dest.clone(),
      obj,
      key,
    });
    dest
  }

  /// Evaluates call arguments left to right. Variables are pinned while
  /// later arguments could still modify them.
  fn compile_args(&mut self, args: &[Node<Expr>]) -> Vec<RValue> {
    let mut out = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
      if let Expr::Spread(s) = arg.stx.as_ref() {
        self.discard(Some(&s.argument));
        self.not_supported(&arg.loc, "spread argument");
        out.push(RValue::UNDEFINED);
        continue;
      }
      let v = self.compile_expr(arg, true, None);
      let v = if args[i + 1..].iter().all(is_simple) {
        v
      } else {
        self.pin(v)
      };
      out.push(v);
    }
    out
  }

  fn call_expr(&mut self, c: &CallExpr, loc: &Loc, need: bool) -> RValue {
    if c.optional {
      self.not_supported(loc, "optional call");
    }
    if let Some(name) = c.callee.stx.as_id() {
      let scope = self.ctx().scope;
      if matches!(name, "__asm__" | "__asmh__") && self.scopes.lookup(scope, name).is_none() {
        return self.native_call(name, c, loc);
      }
    }
    let args_simple = c.arguments.iter().all(is_simple);
    let (callee, func, this) = match c.callee.stx.as_ref() {
      Expr::Member(m) => {
        let obj = self.compile_expr(&m.object, true, None);
        let obj = if args_simple && (!m.computed || is_simple(&m.property)) {
          obj
        } else {
          self.pin(obj)
        };
        let key = self.member_key(m);
        let func = self.fb().alloc_temp();
        self.fb().push(Inst::Get {
          dest: func.clone(),
          obj: obj.clone(),
          key: key.clone(),
        });
        self.release(&key);
        (Callee::Ind(func.clone()), func, obj)
      }
      _ => match self.compile_expr(&c.callee, true, None) {
        // The arguments may reassign the variable; the copy still names the
        // function it held, so the call can become direct.
        RValue::Var(var) if !args_simple => {
          let copy = self.pin(RValue::Var(var));
          (
            Callee::Pinned {
              var,
              copy: copy.clone(),
            },
            copy,
            RValue::UNDEFINED,
          )
        }
        func => (Callee::Ind(func.clone()), func, RValue::UNDEFINED),
      },
    };
    let args = self.compile_args(&c.arguments);
    self.emit_call(callee, func, this, args, need)
  }

  fn new_expr(&mut self, n: &NewExpr, need: bool) -> RValue {
    let func = self.compile_expr(&n.callee, true, None);
    let func = if n.arguments.iter().all(is_simple) {
      func
    } else {
      self.pin(func)
    };
    let args = self.compile_args(&n.arguments);
    self.emit_call(Callee::Cons(func.clone()), func, RValue::UNDEFINED, args, need)
  }

  fn emit_call(&mut self, callee: Callee, func: RValue, this: RValue, args: Vec<RValue>, need: bool) -> RValue {
    // Operands are staged before the call, so their temporaries are free to
    // receive the result.
    self.release(&func);
    self.release(&this);
    for a in args.iter() {
      self.release(a);
    }
    let dest = need.then(|| self.fb().alloc_temp());
    self.fb().gen_call(dest.clone(), callee, this, args);
    dest.unwrap_or(RValue::UNDEFINED)
  }
}

#[cfg(test)]
mod tests {
  use super::super::tests::lower;
  use super::super::tests::messages;
  use super::super::tests::var_named;
  use crate::hir::builder::FunctionBuilder;
  use crate::hir::Callee;
  use crate::hir::FuncId;
  use crate::hir::Imm;
  use crate::hir::Inst;
  use crate::hir::Jump;
  use crate::hir::OpCode;
  use crate::hir::RValue;
  use estree_js::build::*;
  use estree_js::operator::BinaryOp;
  use estree_js::operator::LogicalOp;
  use estree_js::operator::UpdateOp;
  use estree_js::stmt::ForInit;

  fn insts(f: &FunctionBuilder) -> Vec<&Inst> {
    f.blocks.iter().flat_map(|b| b.body.iter()).collect()
  }

  fn writes_to<'f>(f: &'f FunctionBuilder, dest: &RValue) -> Vec<&'f Inst> {
    insts(f)
      .into_iter()
      .filter(|i| matches!(i, Inst::Assign { dest: d, .. } if d == dest))
      .collect()
  }

  #[test]
  fn short_circuit_shares_one_destination() {
    // var a, b; var z = (a && b);
    let p = program(vec![
      var(vec![("a", None), ("b", None)]),
      var(vec![("z", Some(logical(LogicalOp::And, id("a"), id("b"))))]),
    ]);
    let (m, r) = lower(&p, true);
    assert_eq!(r.error_count(), 0, "{:?}", messages(&r));
    let top = m.func(FuncId(0));
    let cond = top
      .blocks
      .iter()
      .find_map(|b| match &b.jump {
        Some(Jump::IfTrue { value, .. }) => Some(value.clone()),
        _ => None,
      })
      .expect("a branch on the left operand");
    assert!(top.is_temp(&cond));
    // One write from `a`, one from `b`, both into the same temporary.
    let writes = writes_to(top, &cond);
    assert_eq!(writes.len(), 2);
    let sources: Vec<_> = writes
      .iter()
      .map(|i| match i {
        Inst::Assign { src, .. } => src.clone(),
        _ => unreachable!(),
      })
      .collect();
    assert!(sources.iter().all(|s| matches!(s, RValue::Var(_))));
    assert_ne!(sources[0], sources[1]);
  }

  #[test]
  fn constant_condition_folds_and_warns() {
    // var x; if (1 < 2) x = 1;
    let p = program(vec![
      var(vec![("x", None)]),
      if_(
        bin(BinaryOp::Lt, num(1.0), num(2.0)),
        expr_stmt(assign(id("x"), num(1.0))),
        None,
      ),
    ]);
    let (m, r) = lower(&p, true);
    assert!(messages(&r).contains(&"warning: condition is always true".to_string()));
    let top = m.func(FuncId(0));
    assert!(top
      .blocks
      .iter()
      .all(|b| !matches!(b.jump, Some(Jump::If { .. } | Jump::IfTrue { .. }))));
  }

  #[test]
  fn greater_than_swaps_operands() {
    // var a, b; if (a > b) a = 1;
    let p = program(vec![
      var(vec![("a", None), ("b", None)]),
      if_(
        bin(BinaryOp::Gt, id("a"), id("b")),
        expr_stmt(assign(id("a"), num(1.0))),
        None,
      ),
    ]);
    let (m, _) = lower(&p, true);
    let top = m.func(FuncId(0));
    let (a, b) = top
      .blocks
      .iter()
      .find_map(|b| match &b.jump {
        Some(Jump::If {
          op: OpCode::IfLt,
          a,
          b,
          ..
        }) => Some((a.clone(), b.clone())),
        _ => None,
      })
      .expect("a relational branch");
    let name = |v: &RValue| match v {
      RValue::Var(id) => m.var(*id).name.clone(),
      other => panic!("unexpected {other:?}"),
    };
    assert_eq!((name(&a), name(&b)), ("b".to_string(), "a".to_string()));
  }

  #[test]
  fn numeric_operators_fold_through_conversion() {
    // var x = "6" - 2 * 2;
    let p = program(vec![var(vec![(
      "x",
      Some(bin(
        BinaryOp::Sub,
        str("6"),
        bin(BinaryOp::Mul, num(2.0), num(2.0)),
      )),
    )])]);
    let (m, _) = lower(&p, true);
    let top = m.func(FuncId(0));
    let assigns: Vec<_> = insts(top)
      .into_iter()
      .filter(|i| matches!(i, Inst::Assign { src: RValue::Imm(Imm::Num(n)), .. } if *n == 2.0))
      .collect();
    assert_eq!(assigns.len(), 1);
    assert!(insts(top).iter().all(|i| !matches!(i, Inst::Binop { .. })));
  }

  #[test]
  fn left_variable_pinned_against_side_effects() {
    // var x; var y = x + (x = 2);
    let p = program(vec![
      var(vec![("x", None)]),
      var(vec![(
        "y",
        Some(bin(BinaryOp::Add, id("x"), assign(id("x"), num(2.0)))),
      )]),
    ]);
    let (m, _) = lower(&p, true);
    let top = m.func(FuncId(0));
    let add = insts(top)
      .into_iter()
      .find_map(|i| match i {
        Inst::Binop {
          op: OpCode::Add, a, ..
        } => Some(a.clone()),
        _ => None,
      })
      .expect("generic add");
    assert!(top.is_temp(&add));
  }

  #[test]
  fn unsupported_constructs_still_lower_operands() {
    // var f; [...f()];
    let p = program(vec![
      var(vec![("f", None)]),
      expr_stmt(array(vec![estree_js::node::Node::new(
        Default::default(),
        estree_js::expr::Expr::Spread(estree_js::expr::SpreadElem {
          argument: call(id("f"), vec![]),
        }),
      )])),
    ]);
    let (m, r) = lower(&p, true);
    assert_eq!(r.error_count(), 1);
    assert!(messages(&r)[0].contains("spread element is not supported"));
    assert!(insts(m.func(FuncId(0)))
      .iter()
      .any(|i| matches!(i, Inst::Call { .. })));
  }

  #[test]
  fn named_function_expression_binds_own_name() {
    // var g = function f(n) { return f; };
    let p = program(vec![var(vec![(
      "g",
      Some(func_expr(Some("f"), &["n"], vec![ret(Some(id("f")))])),
    )])]);
    let (m, r) = lower(&p, true);
    assert_eq!(r.error_count(), 0, "{:?}", messages(&r));
    assert!(m.func(FuncId(0)).vars.iter().all(|v| v.name != "f"));
    // FuncId(1) holds the binding, FuncId(2) is the function itself.
    let f_var = var_named(&m, FuncId(1), "f");
    assert!(f_var.escapes);
    assert_eq!(f_var.func_ref, Some(FuncId(2)));
    assert_eq!(m.func(FuncId(2)).name.as_deref(), Some("f"));
    assert!(insts(m.func(FuncId(0))).iter().any(|i| matches!(i, Inst::Call {
      callee: Callee::Direct {
        func: FuncId(1),
        ..
      },
      ..
    })));
  }

  #[test]
  fn closures_made_in_a_loop_do_not_share_their_name() {
    // var a = []; for (var i = 0; i < 2; i++) a[i] = function f() { return f; };
    let p = program(vec![
      var(vec![("a", Some(array(vec![]))), ("i", None)]),
      for_(
        Some(ForInit::Expr(assign(id("i"), num(0.0)))),
        Some(bin(BinaryOp::Lt, id("i"), num(2.0))),
        Some(update(UpdateOp::Inc, false, id("i"))),
        expr_stmt(assign(
          index(id("a"), id("i")),
          func_expr(Some("f"), &[], vec![ret(Some(id("f")))]),
        )),
      ),
    ]);
    let (m, r) = lower(&p, false);
    assert_eq!(r.error_count(), 0, "{:?}", messages(&r));
    // Each pass through the loop calls the wrapper, whose frame owns `f`.
    assert!(m.func(FuncId(0)).vars.iter().all(|v| v.name != "f"));
    assert!(m.func(FuncId(1)).vars.iter().any(|v| v.name == "f"));
    assert_eq!(m.func(FuncId(1)).parent, Some(FuncId(0)));
    assert_eq!(m.func(FuncId(2)).parent, Some(FuncId(1)));
  }

  #[test]
  fn unused_function_name_needs_no_binding() {
    // var g = function f() { return 1; };
    let p = program(vec![var(vec![(
      "g",
      Some(func_expr(Some("f"), &[], vec![ret(Some(num(1.0)))])),
    )])]);
    let (m, r) = lower(&p, true);
    assert_eq!(r.error_count(), 0);
    assert_eq!(m.func(FuncId(1)).name.as_deref(), Some("f"));
    assert!(m.func(FuncId(0)).vars.iter().all(|v| v.name != "f"));
    assert!(m.func(FuncId(1)).vars.iter().all(|v| v.name != "f"));
    assert!(insts(m.func(FuncId(0)))
      .iter()
      .any(|i| matches!(i, Inst::Closure { func: FuncId(1), .. })));
  }
}
