use super::literal::c_ident_suffix;
use super::literal::emit_c_comment_text;
use super::literal::emit_c_number;
use super::strings::StringTable;
use crate::escape::env_hops;
use crate::hir::builder::FunctionBuilder;
use crate::hir::builder::Layout;
use crate::hir::builder::ModuleBuilder;
use crate::hir::order::block_order;
use crate::hir::AsmPart;
use crate::hir::BlockId;
use crate::hir::Callee;
use crate::hir::CreateKind;
use crate::hir::Imm;
use crate::hir::Inst;
use crate::hir::Jump;
use crate::hir::Label;
use crate::hir::OpCode;
use crate::hir::ParamId;
use crate::hir::RValue;
use crate::hir::Storage;
use crate::hir::SysConst;
use ahash::HashSet;
use ahash::HashSetExt;
use std::fmt;
use tracing::debug;
use tracing::debug_span;

pub const FUNC_PARAMS: &str =
  "(StackFrame * caller, Env * env, unsigned argc, const TaggedValue * argv)";

/// The C name of a compiled function.
pub fn c_function_name(fb: &FunctionBuilder) -> String {
  match fb.name.as_deref() {
    Some(name) if !name.is_empty() => format!("fn{}_{}", fb.id.0, c_ident_suffix(name)),
    _ => format!("fn{}", fb.id.0),
  }
}

pub fn emit_prototype<W: fmt::Write>(out: &mut W, fb: &FunctionBuilder) -> fmt::Result {
  writeln!(out, "static TaggedValue {} {};", c_function_name(fb), FUNC_PARAMS)
}

struct FunctionEmitter<'m> {
  module: &'m ModuleBuilder,
  fb: &'m FunctionBuilder,
  layout: &'m Layout,
  strings: &'m StringTable,
  /// Blocks that some emitted `goto` names.
  targets: HashSet<BlockId>,
}

impl<'m> FunctionEmitter<'m> {
  fn block_of(&self, label: Label) -> BlockId {
    self
      .fb
      .label_block(label)
      .unwrap_or_else(|| panic!("jump to unplaced label {label:?}"))
  }

  fn param<W: fmt::Write>(&self, out: &mut W, p: ParamId) -> fmt::Result {
    // `this` is always passed.
    if p.0 == 0 {
      return out.write_str("argv[0]");
    }
    write!(out, "(argc > {0} ? argv[{0}] : JS_UNDEFINED_VALUE)", p.0)
  }

  fn operand<W: fmt::Write>(&self, out: &mut W, v: &RValue) -> fmt::Result {
    match v {
      RValue::Local(l) => write!(out, "locals[{}]", l.0),
      RValue::ArgSlot(a) => write!(out, "locals[{}]", self.layout.arg_slot_base + a.0),
      RValue::Param(p) => self.param(out, *p),
      RValue::Var(id) => {
        let var = self.module.var(*id);
        match var.storage {
          Some(Storage::Local(l)) if id.func == self.fb.id => write!(out, "locals[{}]", l.0),
          Some(Storage::Param(p)) if id.func == self.fb.id => self.param(out, p),
          Some(Storage::Env(i)) if id.func == self.fb.id => write!(out, "escaped->vars[{i}]"),
          Some(Storage::Env(i)) => {
            out.write_str("env")?;
            for _ in 0..env_hops(self.module, self.fb.id, id.func) {
              out.write_str("->parent")?;
            }
            write!(out, "->vars[{i}]")
          }
          other => panic!(
            "variable {} of {:?} used from {:?} with storage {other:?}",
            var.name, id.func, self.fb.id
          ),
        }
      }
      RValue::Imm(imm) => match imm {
        Imm::Undefined => out.write_str("JS_UNDEFINED_VALUE"),
        Imm::Null => out.write_str("JS_NULL_VALUE"),
        Imm::Bool(true) => out.write_str("JS_TRUE_VALUE"),
        Imm::Bool(false) => out.write_str("JS_FALSE_VALUE"),
        Imm::Num(n) => {
          out.write_str("js_make_number(")?;
          emit_c_number(out, *n)?;
          out.write_char(')')
        }
        Imm::Str(s) => {
          let id = self
            .module
            .string_id(s)
            .unwrap_or_else(|| panic!("string {s:?} was not interned"));
          debug_assert!((id as usize) < self.strings.len());
          write!(out, "js_string_const(&frame, {id})")
        }
      },
    }
  }

  fn rv(&self, v: &RValue) -> String {
    let mut out = String::new();
    self.operand(&mut out, v).unwrap();
    out
  }

  fn closure_env(&self) -> &'static str {
    if self.layout.env_size > 0 {
      "escaped"
    } else {
      "env"
    }
  }

  fn emit_inst<W: fmt::Write>(&self, out: &mut W, inst: &Inst) -> fmt::Result {
    match inst {
      Inst::Closure { dest, func } => writeln!(
        out,
        "  {} = js_new_closure(&frame, {}, {});",
        self.rv(dest),
        self.closure_env(),
        c_function_name(self.module.func(*func))
      ),
      Inst::Create { dest, kind } => match kind {
        CreateKind::Object => writeln!(out, "  {} = js_new_object(&frame);", self.rv(dest)),
        CreateKind::Array { len } => {
          writeln!(out, "  {} = js_new_array(&frame, {len});", self.rv(dest))
        }
      },
      Inst::CreateArguments { dest } => writeln!(
        out,
        "  {} = js_new_arguments(&frame, argc, argv);",
        self.rv(dest)
      ),
      Inst::LoadSc { dest, sc } => match sc {
        SysConst::Thrown => writeln!(out, "  {} = frame.thrown;", self.rv(dest)),
      },
      Inst::EndTry { index } => writeln!(out, "  JS_TRY_END(&frame, &tryRecs[{index}]);"),
      Inst::Asm {
        bindings, parts, ..
      } => {
        out.write_str("  ")?;
        for part in parts {
          match part {
            AsmPart::Text(t) => out.write_str(t)?,
            AsmPart::Binding(i) => self.operand(out, &bindings[*i])?,
          }
        }
        out.write_char('\n')
      }
      Inst::Assign { dest, src } => writeln!(out, "  {} = {};", self.rv(dest), self.rv(src)),
      Inst::Binop { op, dest, a, b } => writeln!(
        out,
        "  {} = js_{}(&frame, {}, {});",
        self.rv(dest),
        op.mnemonic(),
        self.rv(a),
        self.rv(b)
      ),
      Inst::Unop { op, dest, a } => writeln!(
        out,
        "  {} = js_{}(&frame, {});",
        self.rv(dest),
        op.mnemonic(),
        self.rv(a)
      ),
      Inst::Get { dest, obj, key } => writeln!(
        out,
        "  {} = js_get(&frame, {}, {});",
        self.rv(dest),
        self.rv(obj),
        self.rv(key)
      ),
      Inst::Put { obj, key, value } => writeln!(
        out,
        "  js_put(&frame, {}, {}, {});",
        self.rv(obj),
        self.rv(key),
        self.rv(value)
      ),
      Inst::Call { dest, callee, argc } => {
        out.write_str("  ")?;
        if let Some(d) = dest {
          write!(out, "{} = ", self.rv(d))?;
        }
        let args = format!("{argc}, &locals[{}]", self.layout.arg_slot_base);
        match callee {
          Callee::Ind(f) | Callee::Pinned { copy: f, .. } => writeln!(out, "js_call(&frame, {}, {args});", self.rv(f)),
          Callee::Cons(f) => writeln!(out, "js_construct(&frame, {}, {args});", self.rv(f)),
          Callee::Direct { func, closure } => writeln!(
            out,
            "{}(&frame, js_closure_env({}), {args});",
            c_function_name(self.module.func(*func)),
            self.rv(closure)
          ),
        }
      }
    }
  }

  fn goto<W: fmt::Write>(&mut self, out: &mut W, target: BlockId, next: Option<BlockId>) -> fmt::Result {
    if Some(target) == next {
      return Ok(());
    }
    self.targets.insert(target);
    writeln!(out, "  goto B{};", target.0)
  }

  /// Two-way branch. Whichever target follows is reached by falling through.
  fn branch<W: fmt::Write>(
    &mut self,
    out: &mut W,
    cond: String,
    on_true: BlockId,
    on_false: BlockId,
    next: Option<BlockId>,
  ) -> fmt::Result {
    if on_true == on_false {
      writeln!(out, "  (void)({cond});")?;
      return self.goto(out, on_true, next);
    }
    if Some(on_true) == next {
      self.targets.insert(on_false);
      return writeln!(out, "  if (!({cond})) goto B{};", on_false.0);
    }
    self.targets.insert(on_true);
    writeln!(out, "  if ({cond}) goto B{};", on_true.0)?;
    self.goto(out, on_false, next)
  }

  fn emit_jump<W: fmt::Write>(&mut self, out: &mut W, jump: &Jump, next: Option<BlockId>) -> fmt::Result {
    match jump {
      Jump::Ret(v) => writeln!(out, "  return js_leave_frame(&frame, {});", self.rv(v)),
      Jump::Throw(v) => writeln!(out, "  js_throw(&frame, {});", self.rv(v)),
      Jump::Goto(l) => {
        let target = self.block_of(*l);
        self.goto(out, target, next)
      }
      Jump::BeginTry {
        index,
        on_catch,
        on_body,
      } => {
        let (catch, body) = (self.block_of(*on_catch), self.block_of(*on_body));
        self.targets.insert(catch);
        writeln!(
          out,
          "  if (JS_TRY_BEGIN(&frame, &tryRecs[{index}])) goto B{};",
          catch.0
        )?;
        self.goto(out, body, next)
      }
      Jump::Switch {
        value,
        cases,
        default,
      } => {
        writeln!(out, "  switch (js_switch_key(&frame, {})) {{", self.rv(value))?;
        for (k, l) in cases {
          let target = self.block_of(*l);
          self.targets.insert(target);
          writeln!(out, "    case {k}: goto B{};", target.0)?;
        }
        let target = self.block_of(*default);
        self.targets.insert(target);
        writeln!(out, "    default: goto B{};", target.0)?;
        out.write_str("  }\n")
      }
      Jump::IfTrue {
        value,
        on_true,
        on_false,
      } => {
        let cond = format!("js_is_true({})", self.rv(value));
        let (t, f) = (self.block_of(*on_true), self.block_of(*on_false));
        self.branch(out, cond, t, f, next)
      }
      Jump::If {
        op,
        a,
        b,
        on_true,
        on_false,
      } => {
        assert!(op.is_cond() && *op != OpCode::IfTrue, "{op:?} in a relational branch");
        let cond = format!("js_{}(&frame, {}, {})", op.mnemonic(), self.rv(a), self.rv(b));
        let (t, f) = (self.block_of(*on_true), self.block_of(*on_false));
        self.branch(out, cond, t, f, next)
      }
    }
  }
}

/// Emits the C definition of one laid-out function.
pub fn emit_function<W: fmt::Write>(
  out: &mut W,
  module: &ModuleBuilder,
  fb: &FunctionBuilder,
  strings: &StringTable,
) -> fmt::Result {
  let name = c_function_name(fb);
  let span = debug_span!("emit_function", name = name.as_str());
  let _enter = span.enter();
  let layout = fb
    .layout
    .as_ref()
    .unwrap_or_else(|| panic!("function {:?} was not laid out", fb.id));
  let mut emitter = FunctionEmitter {
    module,
    fb,
    layout,
    strings,
    targets: HashSet::new(),
  };

  let order = block_order(fb);
  let mut blocks = Vec::with_capacity(order.len());
  for (i, b) in order.iter().enumerate() {
    let next = order.get(i + 1).copied();
    let block = fb.block(*b);
    let mut text = String::new();
    for inst in block.body.iter() {
      emitter.emit_inst(&mut text, inst)?;
    }
    let jump = block
      .jump
      .as_ref()
      .unwrap_or_else(|| panic!("reachable block {b:?} has no terminator"));
    emitter.emit_jump(&mut text, jump, next)?;
    blocks.push((*b, text));
  }
  debug!(blocks = blocks.len(), labels = emitter.targets.len(), "emitted blocks");

  out.write_str("/* ")?;
  if fb.parent.is_none() {
    out.write_str("top level ")?;
  }
  match fb.name.as_deref() {
    Some(n) if !n.is_empty() => emit_c_comment_text(out, n)?,
    _ => out.write_str("<anonymous>")?,
  };
  out.write_str(" */\n")?;
  writeln!(out, "static TaggedValue {name} {FUNC_PARAMS}")?;
  out.write_str("{\n")?;
  out.write_str("  StackFrame frame;\n")?;
  writeln!(out, "  TaggedValue locals[{}];", layout.local_count)?;
  writeln!(
    out,
    "  js_enter_frame(&frame, caller, {}, locals);",
    layout.local_count
  )?;
  if layout.env_size > 0 {
    writeln!(
      out,
      "  Env * escaped = js_new_env(&frame, env, {});",
      layout.env_size
    )?;
  }
  if fb.try_count > 0 {
    writeln!(out, "  TryRecord tryRecs[{}];", fb.try_count)?;
  }
  for (b, text) in blocks {
    if emitter.targets.contains(&b) {
      writeln!(out, "B{}:", b.0)?;
    }
    out.write_str(&text)?;
  }
  out.write_str("}\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hir::FuncId;
  use crate::lower::tests::lower;
  use estree_js::build::*;
  use estree_js::operator::BinaryOp;

  fn emit_all(program: &estree_js::node::Node<estree_js::stmt::Program>) -> Vec<String> {
    let (mut m, r) = lower(program, true);
    assert_eq!(r.error_count(), 0);
    m.intern_immediates();
    let strings = StringTable::build(m.strings());
    m.funcs
      .iter()
      .map(|fb| {
        let mut out = String::new();
        emit_function(&mut out, &m, fb, &strings).unwrap();
        out
      })
      .collect()
  }

  #[test]
  fn straight_line_code_has_no_labels() {
    // var x = "a"; x = x + 1;
    let p = program(vec![
      var(vec![("x", Some(str("a")))]),
      expr_stmt(assign(id("x"), bin(BinaryOp::Add, id("x"), num(1.0)))),
    ]);
    let out = emit_all(&p).remove(0);
    assert!(!out.contains("goto"), "{out}");
    assert!(!out.contains("\nB"), "{out}");
    assert!(out.contains("js_string_const(&frame, 0)"), "{out}");
    assert!(out.contains("= js_add(&frame, "), "{out}");
    assert!(out.contains("js_make_number(1)"), "{out}");
    assert!(out.contains("return js_leave_frame(&frame, locals[0]);"), "{out}");
    assert!(out.starts_with("/* top level test */\nstatic TaggedValue fn0_test "));
  }

  #[test]
  fn captured_variables_walk_the_environment_chain() {
    // function a() { var x; return function () { return function () { return x; }; }; }
    let inner = func_expr(None, &[], vec![ret(Some(id("x")))]);
    let middle = func_expr(None, &[], vec![ret(Some(inner))]);
    let p = program(vec![func_decl("a", &[], vec![
      var(vec![("x", None)]),
      ret(Some(middle)),
    ])]);
    let out = emit_all(&p);
    assert!(out[1].contains("Env * escaped = js_new_env(&frame, env, 1);"));
    // `middle` has no environment of its own, so closures it creates share `env`.
    assert!(!out[2].contains("escaped"));
    assert!(out[2].contains("js_new_closure(&frame, env, fn3)"), "{}", out[2]);
    assert!(out[3].contains("env->vars[0]"), "{}", out[3]);
    assert!(!out[3].contains("->parent"));
  }

  #[test]
  fn branches_fall_through_to_the_next_block() {
    // function f(a) { if (a < 1) return 1; return 2; }
    let p = program(vec![func_decl("f", &["a"], vec![
      if_(bin(BinaryOp::Lt, id("a"), num(1.0)), ret(Some(num(1.0))), None),
      ret(Some(num(2.0))),
    ])]);
    let out = emit_all(&p).remove(1);
    assert_eq!(out.matches("js_if_lt(&frame, ").count(), 1, "{out}");
    assert_eq!(out.matches(" goto ").count(), out.matches("goto B").count());
    // Every emitted label is the target of some jump.
    for line in out.lines().filter(|l| l.starts_with('B')) {
      let label = line.trim_end_matches(':');
      assert!(out.contains(&format!("goto {label};")), "{out}");
    }
  }

  #[test]
  fn parameters_default_to_undefined() {
    // function f(a, b) { return function () { return a; }; }
    let p = program(vec![func_decl("f", &["a", "b"], vec![ret(Some(func_expr(
      None,
      &[],
      vec![ret(Some(id("a")))],
    )))])]);
    let out = emit_all(&p).remove(1);
    assert!(out.contains("escaped->vars[0] = (argc > 1 ? argv[1] : JS_UNDEFINED_VALUE);"), "{out}");
  }

  #[test]
  fn function_names_are_c_identifiers() {
    let p = program(vec![func_decl("$x", &[], vec![])]);
    let (m, _) = lower(&p, false);
    assert_eq!(c_function_name(m.func(FuncId(1))), "fn1__x");
    assert_eq!(c_function_name(m.func(FuncId(0))), "fn0_test");
  }
}
