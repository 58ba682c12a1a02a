//! Lowering of the syntax tree into HIR.
//!
//! Every source function gets a [`FunctionContext`] holding its scopes, jump
//! targets and active `try` regions. Functions are compiled depth first: a
//! nested function is finished, and its storage laid out, before the
//! enclosing function continues.

mod assign;
mod expr;
mod hoist;
mod native;
mod stmt;

use crate::escape;
use crate::hir::builder::FunctionBuilder;
use crate::hir::builder::ModuleBuilder;
use crate::hir::FuncId;
use crate::hir::Imm;
use crate::hir::Inst;
use crate::hir::Label;
use crate::hir::ParamId;
use crate::hir::RValue;
use crate::report::Reporter;
use crate::scope::ScopeId;
use crate::scope::ScopeTree;
use crate::scope::VariableId;
use ahash::HashMap;
use ahash::HashMapExt;
use derive_visitor::Drive;
use derive_visitor::Visitor;
use estree_js::expr::Id;
use estree_js::func::Func;
use estree_js::node::Loc;
use estree_js::node::Node;
use estree_js::stmt::Program;
use estree_js::stmt::Stmt;
use tracing::debug;
use tracing::debug_span;

/// Where a boolean expression should jump instead of producing a value.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Branch {
  pub on_true: Label,
  pub on_false: Label,
}

impl Branch {
  pub fn new(on_true: Label, on_false: Label) -> Branch {
    Branch { on_true, on_false }
  }

  pub fn inverted(self) -> Branch {
    Branch {
      on_true: self.on_false,
      on_false: self.on_true,
    }
  }
}

/// A statement `break` or `continue` can leave.
#[derive(Debug)]
struct JumpTarget {
  names: Vec<String>,
  break_label: Label,
  continue_label: Option<Label>,
  /// Loops and switches accept an unlabeled `break`.
  breakable: bool,
  /// Number of active `try` regions when the target was entered.
  try_depth: usize,
}

#[derive(Debug)]
pub(crate) struct FunctionContext {
  pub func: FuncId,
  pub root: ScopeId,
  pub scope: ScopeId,
  pub strict: bool,
  /// Every variable owned by this function, in creation order.
  pub vars: Vec<VariableId>,
  targets: Vec<JumpTarget>,
  tries: Vec<u32>,
  /// Bindings that stand in for a declaration whose name was read-only.
  shadows: HashMap<String, VariableId>,
}

impl FunctionContext {
  fn new(func: FuncId, root: ScopeId, strict: bool) -> FunctionContext {
    FunctionContext {
      func,
      root,
      scope: root,
      strict,
      vars: Vec::new(),
      targets: Vec::new(),
      tries: Vec::new(),
      shadows: HashMap::new(),
    }
  }
}

#[derive(Visitor)]
#[visitor(Id(enter))]
struct NameUse<'a> {
  name: &'a str,
  found: bool,
}

impl<'a> NameUse<'a> {
  fn enter_id(&mut self, id: &Id) {
    if id.name == self.name {
      self.found = true;
    }
  }
}

/// Any identifier in the function's parameters or body spells `name`. Over
/// approximates: shadowing declarations and property names also count.
fn mentions(func: &Func, name: &str) -> bool {
  let mut visitor = NameUse { name, found: false };
  for p in func.params.iter() {
    p.drive(&mut visitor);
  }
  func.body.drive(&mut visitor);
  visitor.found
}

pub(crate) fn has_use_strict(body: &[Node<Stmt>]) -> bool {
  body
    .iter()
    .map_while(|s| match s.stx.as_ref() {
      Stmt::Expr(e) => e.directive.as_deref(),
      _ => None,
    })
    .any(|d| d == "use strict")
}

pub struct Compiler<'a> {
  pub module: ModuleBuilder,
  pub scopes: ScopeTree,
  report: &'a mut Reporter,
  ctxs: Vec<FunctionContext>,
  top_scope: Option<ScopeId>,
  /// Labels of a labeled statement waiting for the loop they name.
  pending_labels: Vec<String>,
}

impl<'a> Compiler<'a> {
  pub fn new(report: &'a mut Reporter) -> Compiler<'a> {
    Compiler {
      module: ModuleBuilder::new(),
      scopes: ScopeTree::new(),
      report,
      ctxs: Vec::new(),
      top_scope: None,
      pending_labels: Vec::new(),
    }
  }

  pub fn error_count(&self) -> usize {
    self.report.error_count()
  }

  // Context access.

  fn ctx(&self) -> &FunctionContext {
    self.ctxs.last().expect("no function is being compiled")
  }

  fn ctx_mut(&mut self) -> &mut FunctionContext {
    self.ctxs.last_mut().expect("no function is being compiled")
  }

  fn fb(&mut self) -> &mut FunctionBuilder {
    let f = self.ctx().func;
    self.module.func_mut(f)
  }

  fn strict(&self) -> bool {
    self.ctx().strict
  }

  fn error(&mut self, loc: &Loc, message: impl Into<String>) {
    self.report.error(loc, message);
  }

  fn warning(&mut self, loc: &Loc, message: impl Into<String>) {
    self.report.warning(loc, message);
  }

  fn strict_error(&mut self, loc: &Loc, message: impl Into<String>) {
    let strict = self.strict();
    self.report.strict_error(strict, loc, message);
  }

  fn not_supported(&mut self, loc: &Loc, what: &str) {
    self.error(loc, format!("{what} is not supported"));
  }

  fn release(&mut self, v: &RValue) {
    self.fb().release(v);
  }

  // Variables.

  /// Creates a variable in `scope` backed by a fresh HIR variable of the
  /// function owning that scope.
  fn new_variable(&mut self, scope: ScopeId, name: &str, anonymous: bool, param: Option<ParamId>) -> VariableId {
    let id = if anonymous {
      self.scopes.declare_anonymous(scope, name)
    } else {
      self.scopes.declare(scope, name)
    };
    let owner = self.scopes.scope(scope).ctx;
    let hvar = self.module.func_mut(owner).new_var(name, param);
    self.scopes.var_mut(id).hvar = Some(hvar);
    let ctx = self
      .ctxs
      .iter_mut()
      .rev()
      .find(|c| c.func == owner)
      .expect("variable owner is not being compiled");
    ctx.vars.push(id);
    id
  }

  fn hvar(&self, id: VariableId) -> RValue {
    let v = self.scopes.var(id);
    RValue::Var(
      v.hvar
        .unwrap_or_else(|| panic!("variable '{}' has no storage", v.name)),
    )
  }

  /// Resolves an identifier reference, creating implicit bindings for
  /// `arguments` and for undeclared names.
  fn resolve(&mut self, name: &str, loc: &Loc) -> VariableId {
    if name == "arguments" && self.ctxs.len() > 1 {
      return self.arguments_variable();
    }
    let scope = self.ctx().scope;
    if let Some(v) = self.scopes.lookup(scope, name) {
      return v;
    }
    let top = self.top_scope.expect("top-level scope");
    if self.strict() {
      self.error(loc, format!("undeclared identifier '{name}'"));
    } else {
      self.warning(loc, format!("undeclared identifier '{name}', assuming a global"));
    }
    let v = self.new_variable(top, name, false, None);
    self.scopes.var_mut(v).declared = true;
    v
  }

  /// The current function's own `arguments` object, created on first use.
  fn arguments_variable(&mut self) -> VariableId {
    let func = self.ctx().func;
    let mut scope = Some(self.ctx().scope);
    while let Some(s) = scope {
      let sc = self.scopes.scope(s);
      if sc.ctx != func {
        break;
      }
      if let Some(v) = self.scopes.lookup_local(s, "arguments") {
        return v;
      }
      scope = sc.parent;
    }
    let root = self.ctx().root;
    let v = self.new_variable(root, "arguments", false, None);
    self.scopes.var_mut(v).declared = true;
    self.scopes.var_mut(v).initialized = true;
    let dest = self.hvar(v);
    self.fb().insert_prologue(Inst::CreateArguments { dest });
    self.scopes.var_mut(v).set_accessed(func);
    v
  }

  /// The value of a variable read.
  fn read_var(&mut self, id: VariableId) -> RValue {
    if let Some(c) = &self.scopes.var(id).constant {
      return RValue::Imm(c.clone());
    }
    let from = self.ctx().func;
    self.scopes.var_mut(id).set_accessed(from);
    self.hvar(id)
  }

  /// The storage a write goes to, or None for a read-only binding.
  fn write_var(&mut self, id: VariableId, loc: &Loc) -> Option<RValue> {
    if self.scopes.var(id).read_only {
      let name = self.scopes.var(id).name.clone();
      self.strict_error(loc, format!("cannot assign to read-only '{name}'"));
      return None;
    }
    let from = self.ctx().func;
    let v = self.scopes.var_mut(id);
    v.set_accessed(from);
    v.assigned = true;
    Some(self.hvar(id))
  }

  /// Binds a variable as the target of a declaration initializer, honoring
  /// shadows created for read-only names.
  fn declared_target(&mut self, name: &str, loc: &Loc) -> VariableId {
    if let Some(v) = self.ctx().shadows.get(name) {
      return *v;
    }
    self.resolve(name, loc)
  }

  // Functions.

  /// Compiles a wrapper whose environment holds `name`, read-only and bound
  /// to a fresh closure of `func`, and which returns that closure. Calling
  /// the wrapper once per evaluation gives every closure its own binding.
  fn compile_name_binding(&mut self, func: &Func, name: &str, loc: &Loc) -> FuncId {
    let strict = self.strict();
    let parent = self.ctx().func;
    let parent_scope = self.ctx().scope;
    let id = self.module.new_function(Some(parent), None, strict);
    let span = debug_span!("lower_function", id = id.0, name = name);
    let _enter = span.enter();

    let root = self.scopes.new_scope(Some(parent_scope), id, true);
    self.ctxs.push(FunctionContext::new(id, root, strict));
    let v = self.new_variable(root, name, false, None);
    let var = self.scopes.var_mut(v);
    var.read_only = true;
    var.declared = true;
    var.initialized = true;
    let inner = self.compile_function(func, Some(name), loc, root);
    self.scopes.var_mut(v).func_ref = Some(inner);
    let dest = self.read_var(v);
    self.fb().push(Inst::Closure {
      dest: dest.clone(),
      func: inner,
    });
    self.fb().gen_ret(dest);
    self.finish_function();
    id
  }

  /// Lowers a function body into a new nested function and lays it out.
  fn compile_function(&mut self, func: &Func, name: Option<&str>, loc: &Loc, parent_scope: ScopeId) -> FuncId {
    let strict = self.strict() || has_use_strict(&func.body.stx.body);
    if func.generator {
      self.not_supported(loc, "generator function");
    }
    if func.is_async {
      self.not_supported(loc, "async function");
    }
    let parent = self.ctx().func;
    let id = self
      .module
      .new_function(Some(parent), name.map(str::to_string), strict);
    let span = debug_span!("lower_function", id = id.0, name = name.unwrap_or(""));
    let _enter = span.enter();

    let root = self.scopes.new_scope(Some(parent_scope), id, true);
    self.ctxs.push(FunctionContext::new(id, root, strict));
    // Targets never cross function boundaries.
    let pending = std::mem::take(&mut self.pending_labels);

    for param in func.params.iter() {
      let Some(pname) = param.stx.as_id() else {
        self.not_supported(&param.loc, "destructuring parameter");
        let p = self.fb().add_param();
        self.new_variable(root, "", true, Some(p));
        continue;
      };
      if self.scopes.lookup_local(root, pname).is_some() {
        self.strict_error(&param.loc, format!("duplicate parameter '{pname}'"));
      }
      let p = self.fb().add_param();
      let v = self.new_variable(root, pname, false, Some(p));
      let var = self.scopes.var_mut(v);
      var.declared = true;
      var.initialized = true;
    }

    self.compile_body(&func.body.stx.body);
    self.finish_function();
    self.pending_labels = pending;
    id
  }

  /// Hoists declarations, instantiates hoisted functions, then lowers the
  /// statements of a function or program body.
  fn compile_body(&mut self, body: &[Node<Stmt>]) {
    let hoisted = self.hoist_body(body);
    self.instantiate_functions(hoisted);
    for stmt in body {
      self.compile_stmt(stmt);
    }
  }

  fn instantiate_functions(&mut self, hoisted: Vec<(VariableId, &Func, Loc)>) {
    for (var, func, loc) in hoisted {
      let name = func.id.as_ref().map(|id| id.stx.name.clone());
      let root = self.ctx().root;
      let f = self.compile_function(func, name.as_deref(), &loc, root);
      let from = self.ctx().func;
      let dest = self.hvar(var);
      self.scopes.var_mut(var).set_accessed(from);
      self.scopes.var_mut(var).func_ref = Some(f);
      self.fb().push(Inst::Closure { dest, func: f });
    }
  }

  /// Closes the current function, publishes what lowering learned about its
  /// variables, and lays out its storage.
  fn finish_function(&mut self) {
    let ctx = self.ctxs.pop().expect("no function is being compiled");
    self.module.func_mut(ctx.func).finish();
    for id in ctx.vars.iter() {
      let v = self.scopes.var(*id);
      let Some(hv) = v.hvar else {
        continue;
      };
      let func_ref = v.func_ref.filter(|_| !v.assigned);
      let (accessed, escapes) = (v.accessed, v.escapes);
      let hvar = self.module.var_mut(hv);
      hvar.accessed = accessed;
      hvar.escapes = escapes;
      hvar.func_ref = func_ref;
    }
    escape::layout_function(&mut self.module, ctx.func);
    debug!(func = ctx.func.0, vars = ctx.vars.len(), "finished function");
  }

  // Program.

  /// Sets up the top-level function and hoists the program's declarations.
  /// Returns the hoisted functions, to be passed to [`Compiler::compile_program_body`].
  pub fn begin_program<'p>(&mut self, program: &'p Node<Program>, name: &str, strict: bool) -> Vec<(VariableId, &'p Func, Loc)> {
    let strict = strict || has_use_strict(&program.stx.body);
    let id = self.module.new_function(None, Some(name.to_string()), strict);
    let top = self.scopes.new_scope(None, id, true);
    self.top_scope = Some(top);
    self.ctxs.push(FunctionContext::new(id, top, strict));
    self.scopes.declare_constant(top, "undefined", Imm::Undefined);
    self.scopes.declare_constant(top, "NaN", Imm::Num(f64::NAN));
    self.scopes.declare_constant(top, "Infinity", Imm::Num(f64::INFINITY));
    let span = debug_span!("hoist", func = id.0);
    let _enter = span.enter();
    self.hoist_body(&program.stx.body)
  }

  pub fn compile_program_body(&mut self, program: &Node<Program>, hoisted: Vec<(VariableId, &Func, Loc)>) {
    let span = debug_span!("lower_function", id = 0, name = "<top>");
    let _enter = span.enter();
    self.instantiate_functions(hoisted);
    for stmt in program.stx.body.iter() {
      self.compile_stmt(stmt);
    }
    self.finish_function();
    assert!(self.ctxs.is_empty());
  }

  pub fn into_module(self) -> ModuleBuilder {
    self.module
  }
}
